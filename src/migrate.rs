//! Schema and index management.
//!
//! [`ensure_indexes`] is idempotent and safe to run at every startup. It
//! creates the `skills` table, migrates the legacy `resolution_md` column
//! to `resolution`, creates the `skill_keywords` full-text index (an FTS5
//! external-content table kept in sync by triggers), and registers the
//! `skill_embedding` vector index in the `skill_indexes` catalog.
//!
//! Vector similarity is computed in process over the stored BLOBs; the
//! catalog row is what makes the vector index "exist" and pins its
//! dimension.

use sqlx::SqlitePool;

use skillbank_core::{Result, SkillError};

use crate::config::Config;
use crate::db::{self, store_err};

pub const VECTOR_INDEX: &str = "skill_embedding";
pub const FULLTEXT_INDEX: &str = "skill_keywords";

const LEGACY_RESOLUTION: &str = "resolution_md";

/// `skb init`: open (or create) the database and ensure every index.
pub async fn run_init(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db).await?;
    let result = ensure_indexes(&pool, config.embedding.dims).await;
    db::close(&pool).await;
    result?;
    println!(
        "Database initialized at {} (embedding dim {}).",
        config.db.path.display(),
        config.embedding.dims
    );
    Ok(())
}

/// Create or verify every table and index the store depends on.
pub async fn ensure_indexes(pool: &SqlitePool, dims: usize) -> Result<()> {
    create_skills_table(pool).await?;
    let migrated = migrate_legacy_resolution(pool).await?;
    let fts_created = create_fulltext_index(pool).await?;
    if fts_created || migrated {
        rebuild_fulltext_index(pool).await?;
    }
    register_vector_index(pool, dims).await?;
    tracing::debug!(dims, "indexes ready");
    Ok(())
}

async fn create_skills_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS skills (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            problem TEXT NOT NULL,
            resolution TEXT NOT NULL DEFAULT '',
            conditions TEXT NOT NULL DEFAULT '[]',
            keywords TEXT NOT NULL DEFAULT '[]',
            embedding BLOB NOT NULL,
            product_area TEXT NOT NULL DEFAULT '',
            issue_type TEXT NOT NULL DEFAULT '',
            confidence REAL NOT NULL DEFAULT 0.5,
            times_used INTEGER NOT NULL DEFAULT 0,
            times_confirmed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS skill_indexes (
            name TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            field TEXT NOT NULL,
            dims INTEGER,
            similarity TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(store_err)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_skills_updated_at ON skills(updated_at DESC)")
        .execute(pool)
        .await
        .map_err(store_err)?;

    Ok(())
}

async fn skill_columns(pool: &SqlitePool) -> Result<Vec<String>> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info('skills')")
        .fetch_all(pool)
        .await
        .map_err(store_err)
}

/// Move values from the legacy `resolution_md` column into `resolution`.
///
/// Rows whose `resolution` is already non-empty keep it. Returns `true`
/// if a legacy column was found and removed.
async fn migrate_legacy_resolution(pool: &SqlitePool) -> Result<bool> {
    let columns = skill_columns(pool).await?;
    if !columns.iter().any(|c| c == LEGACY_RESOLUTION) {
        return Ok(false);
    }

    let mut tx = pool.begin().await.map_err(store_err)?;

    // The FTS triggers may reference the old column layout.
    for trigger in ["skills_ai", "skills_ad", "skills_au"] {
        sqlx::query(&format!("DROP TRIGGER IF EXISTS {trigger}"))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
    }
    sqlx::query("DROP TABLE IF EXISTS skills_fts")
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

    if !columns.iter().any(|c| c == "resolution") {
        sqlx::query("ALTER TABLE skills ADD COLUMN resolution TEXT NOT NULL DEFAULT ''")
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
    }

    let copied = sqlx::query(
        "UPDATE skills SET resolution = COALESCE(resolution_md, '') \
         WHERE resolution IS NULL OR resolution = ''",
    )
    .execute(&mut *tx)
    .await
    .map_err(store_err)?
    .rows_affected();

    sqlx::query("ALTER TABLE skills DROP COLUMN resolution_md")
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

    tx.commit().await.map_err(store_err)?;
    tracing::info!(rows = copied, "migrated legacy resolution_md column");
    Ok(true)
}

/// Create the FTS5 table and its sync triggers. Returns `true` if the
/// table did not exist before.
async fn create_fulltext_index(pool: &SqlitePool) -> Result<bool> {
    // FTS5 CREATE has no IF NOT EXISTS guarantee across versions, so check first
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='skills_fts'",
    )
    .fetch_one(pool)
    .await
    .map_err(store_err)?;

    if !exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE skills_fts USING fts5(
                title,
                problem,
                resolution,
                keywords,
                content='skills',
                content_rowid='rowid'
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(store_err)?;
    }

    let triggers = [
        r#"
        CREATE TRIGGER IF NOT EXISTS skills_ai AFTER INSERT ON skills BEGIN
            INSERT INTO skills_fts(rowid, title, problem, resolution, keywords)
            VALUES (new.rowid, new.title, new.problem, new.resolution, new.keywords);
        END
        "#,
        r#"
        CREATE TRIGGER IF NOT EXISTS skills_ad AFTER DELETE ON skills BEGIN
            INSERT INTO skills_fts(skills_fts, rowid, title, problem, resolution, keywords)
            VALUES ('delete', old.rowid, old.title, old.problem, old.resolution, old.keywords);
        END
        "#,
        r#"
        CREATE TRIGGER IF NOT EXISTS skills_au AFTER UPDATE ON skills BEGIN
            INSERT INTO skills_fts(skills_fts, rowid, title, problem, resolution, keywords)
            VALUES ('delete', old.rowid, old.title, old.problem, old.resolution, old.keywords);
            INSERT INTO skills_fts(rowid, title, problem, resolution, keywords)
            VALUES (new.rowid, new.title, new.problem, new.resolution, new.keywords);
        END
        "#,
    ];
    for sql in triggers {
        sqlx::query(sql).execute(pool).await.map_err(store_err)?;
    }

    sqlx::query(
        "INSERT OR IGNORE INTO skill_indexes (name, kind, field, dims, similarity) \
         VALUES (?, 'fulltext', 'title,problem,resolution,keywords', NULL, NULL)",
    )
    .bind(FULLTEXT_INDEX)
    .execute(pool)
    .await
    .map_err(store_err)?;

    Ok(!exists)
}

async fn rebuild_fulltext_index(pool: &SqlitePool) -> Result<()> {
    sqlx::query("INSERT INTO skills_fts(skills_fts) VALUES('rebuild')")
        .execute(pool)
        .await
        .map_err(store_err)?;
    tracing::debug!("full-text index rebuilt");
    Ok(())
}

/// Register the vector index, or verify an existing registration was
/// made for the same dimension.
async fn register_vector_index(pool: &SqlitePool, dims: usize) -> Result<()> {
    let existing: Option<Option<i64>> =
        sqlx::query_scalar("SELECT dims FROM skill_indexes WHERE name = ?")
            .bind(VECTOR_INDEX)
            .fetch_optional(pool)
            .await
            .map_err(store_err)?;

    match existing {
        Some(Some(stored)) if stored as usize != dims => Err(SkillError::Validation(format!(
            "vector index {VECTOR_INDEX} was created with dim {stored}, configured dim is {dims}"
        ))),
        Some(_) => Ok(()),
        None => {
            sqlx::query(
                "INSERT INTO skill_indexes (name, kind, field, dims, similarity) \
                 VALUES (?, 'vector', 'embedding', ?, 'cosine')",
            )
            .bind(VECTOR_INDEX)
            .bind(dims as i64)
            .execute(pool)
            .await
            .map_err(store_err)?;
            tracing::info!(dims, "registered vector index {}", VECTOR_INDEX);
            Ok(())
        }
    }
}

/// Fail with [`SkillError::MissingIndex`] unless `name` is registered.
pub async fn require_index(pool: &SqlitePool, name: &str) -> Result<()> {
    let registered: Option<String> =
        sqlx::query_scalar("SELECT name FROM skill_indexes WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(store_err)?;
    match registered {
        Some(_) => Ok(()),
        None => Err(SkillError::MissingIndex(format!(
            "{name} does not exist; run `skb init`"
        ))),
    }
}
