//! SQLite store tests against a real database file in a temp directory.

use chrono::Utc;
use sqlx::SqlitePool;
use tempfile::TempDir;

use skillbank::config::DbConfig;
use skillbank::db;
use skillbank::migrate;
use skillbank::sqlite_store::SqliteStore;
use skillbank_core::store::SkillStore;
use skillbank_core::{LibrarySettings, SkillDraft, SkillError, SkillLibrary, SkillPatch};

const DIMS: usize = 4;

async fn open_pool(dir: &TempDir) -> SqlitePool {
    db::connect(&DbConfig {
        path: dir.path().join("skills.sqlite"),
        max_connections: 2,
        busy_timeout_secs: 1,
    })
    .await
    .unwrap()
}

async fn ready_library(dir: &TempDir) -> SkillLibrary<SqliteStore> {
    let pool = open_pool(dir).await;
    let library = SkillLibrary::new(SqliteStore::new(pool, DIMS), LibrarySettings::new(DIMS));
    library.ensure_indexes().await.unwrap();
    library
}

fn draft(title: &str, problem: &str, keywords: &[&str], embedding: Vec<f32>) -> SkillDraft {
    SkillDraft {
        title: title.to_string(),
        problem: problem.to_string(),
        resolution: "## Steps\n1. Open settings\n2. Click **Reset**".to_string(),
        conditions: vec!["user has verified email".to_string()],
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        embedding,
        product_area: "accounts".to_string(),
        issue_type: "how-to".to_string(),
    }
}

#[tokio::test]
async fn test_ensure_indexes_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    library.ensure_indexes().await.unwrap();
    library.ensure_indexes().await.unwrap();

    let skill = library
        .new_skill(draft("Reset password", "cannot log in", &["password"], vec![1.0, 0.0, 0.0, 0.0]))
        .unwrap();
    library.create(&skill).await.unwrap();
    library.ensure_indexes().await.unwrap();

    let hits = library.search(&[1.0, 0.0, 0.0, 0.0], "password", 5).await.unwrap();
    assert_eq!(hits.len(), 1, "re-running ensure_indexes must not duplicate index rows");
}

#[tokio::test]
async fn test_search_before_init_is_missing_index() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(&dir).await;
    let store = SqliteStore::new(pool, DIMS);

    let err = store.vector_search(&[1.0, 0.0, 0.0, 0.0], 3).await.unwrap_err();
    assert!(matches!(err, SkillError::MissingIndex(_)), "got {err:?}");
    let err = store.keyword_search("password", 3).await.unwrap_err();
    assert!(matches!(err, SkillError::MissingIndex(_)), "got {err:?}");
}

#[tokio::test]
async fn test_create_get_round_trip_preserves_every_field() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    let skill = library
        .new_skill(draft(
            "Reset password",
            "Customer cannot log in after reset",
            &["password", "login"],
            vec![0.25, -0.5, 0.125, 1.0],
        ))
        .unwrap();

    let created = library.create(&skill).await.unwrap();
    assert_eq!(created, skill);
    let fetched = library.get(&skill.id).await.unwrap().unwrap();
    assert_eq!(fetched, skill);
    assert_eq!(fetched.resolution, "## Steps\n1. Open settings\n2. Click **Reset**");
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    assert!(library.get("00000000-0000-0000-0000-000000000000").await.unwrap().is_none());
}

#[tokio::test]
async fn test_second_insert_with_same_id_is_consistency_fault() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    let skill = library
        .new_skill(draft("Reset password", "cannot log in", &[], vec![0.1; DIMS]))
        .unwrap();
    library.create(&skill).await.unwrap();

    assert_eq!(library.store().insert_skill(&skill).await.unwrap(), 0);
    let err = library.create(&skill).await.unwrap_err();
    assert!(matches!(err, SkillError::Consistency(_)));
}

#[tokio::test]
async fn test_hybrid_search_ranks_keyword_and_vector_match_first() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;

    let reset = library
        .new_skill(draft("Reset password", "cannot log in", &["password"], vec![1.0, 0.0, 0.0, 0.0]))
        .unwrap();
    let refund = library
        .new_skill(draft("Issue refund", "charged twice", &["refund"], vec![0.0, 1.0, 0.0, 0.0]))
        .unwrap();
    let invoice = library
        .new_skill(draft("Fix invoice", "wrong currency", &["invoice"], vec![0.0, 0.0, 1.0, 0.0]))
        .unwrap();
    for s in [&reset, &refund, &invoice] {
        library.create(s).await.unwrap();
    }

    let hits = library.search(&[0.9, 0.1, 0.0, 0.0], "password", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].skill.id, reset.id);
    assert!(hits[0].score >= hits[1].score);
    for h in &hits {
        assert!((0.0..=1.0).contains(&h.score));
    }
}

#[tokio::test]
async fn test_keyword_search_tolerates_fts_syntax() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    let skill = library
        .new_skill(draft("Reset password", "cannot log in", &["password"], vec![1.0, 0.0, 0.0, 0.0]))
        .unwrap();
    library.create(&skill).await.unwrap();

    let hits = library
        .store()
        .keyword_search("password\" OR NEAR(* AND", 5)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(library.store().keyword_search("?!", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_detection_and_create_or_get() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    let e = vec![0.9, 0.1, 0.0, 0.2];

    let first = library
        .new_skill(draft("Reset password", "cannot log in", &[], e.clone()))
        .unwrap();
    assert!(library.create_or_get(&first).await.unwrap().created);

    let found = library.check_duplicate(&e, None).await.unwrap();
    assert_eq!(found.map(|s| s.id), Some(first.id.clone()));

    let orthogonal = library.check_duplicate(&[0.0, 0.0, 1.0, 0.0], None).await.unwrap();
    assert!(orthogonal.is_none());

    let again = library
        .new_skill(draft("Reset password (copy)", "cannot log in", &[], e))
        .unwrap();
    let outcome = library.create_or_get(&again).await.unwrap();
    assert!(!outcome.created);
    assert_eq!(outcome.skill.id, first.id);
    assert_eq!(outcome.skill.title, "Reset password");
}

#[tokio::test]
async fn test_update_bumps_version_and_reindexes_text() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    let skill = library
        .new_skill(draft("Reset password", "cannot log in", &["password"], vec![0.1; DIMS]))
        .unwrap();
    library.create(&skill).await.unwrap();

    let patch = SkillPatch {
        keywords: Some(vec!["mfa".to_string(), "MFA".to_string()]),
        confidence: Some(0.9),
        ..Default::default()
    };
    let updated = library.update(&skill.id, patch).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.keywords, vec!["mfa".to_string()]);
    assert_eq!(updated.confidence, 0.9);
    assert_eq!(updated.title, skill.title);
    assert_eq!(updated.created_at, skill.created_at);
    assert!(updated.updated_at >= skill.updated_at);

    let by_new = library.store().keyword_search("mfa", 5).await.unwrap();
    assert_eq!(by_new.len(), 1);

    let again = library.update(&skill.id, SkillPatch::default()).await.unwrap();
    assert_eq!(again.version, 3);
}

#[tokio::test]
async fn test_update_missing_is_not_found_and_bad_dim_is_rejected() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;

    let err = library.update("nope", SkillPatch::default()).await.unwrap_err();
    assert!(matches!(err, SkillError::NotFound(_)));

    let skill = library
        .new_skill(draft("Reset password", "cannot log in", &[], vec![0.1; DIMS]))
        .unwrap();
    library.create(&skill).await.unwrap();
    let patch = SkillPatch {
        embedding: Some(vec![0.1; DIMS + 1]),
        ..Default::default()
    };
    let err = library.update(&skill.id, patch).await.unwrap_err();
    assert!(matches!(err, SkillError::Validation(_)));
    assert_eq!(library.get(&skill.id).await.unwrap().unwrap().version, 1);
}

#[tokio::test]
async fn test_store_apply_patch_reports_zero_for_unknown_id() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    let written = library
        .store()
        .apply_patch("missing", &SkillPatch::default(), Utc::now())
        .await
        .unwrap();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn test_vector_index_dimension_is_pinned() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(&dir).await;
    migrate::ensure_indexes(&pool, DIMS).await.unwrap();
    let err = migrate::ensure_indexes(&pool, DIMS * 2).await.unwrap_err();
    assert!(matches!(err, SkillError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_legacy_resolution_md_is_migrated() {
    let dir = TempDir::new().unwrap();
    let pool = open_pool(&dir).await;

    sqlx::query(
        r#"
        CREATE TABLE skills (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            problem TEXT NOT NULL,
            resolution_md TEXT,
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
    .execute(&pool)
    .await
    .unwrap();

    let blob = skillbank_core::embedding::vec_to_blob(&[1.0, 0.0, 0.0, 0.0]);
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO skills (id, title, problem, resolution_md, keywords, embedding, created_at, updated_at) \
         VALUES ('legacy-1', 'Old skill', 'printer jams', '1. Open tray', '[\"printer\"]', ?, ?, ?)",
    )
    .bind(&blob)
    .bind(&now)
    .bind(&now)
    .execute(&pool)
    .await
    .unwrap();

    let store = SqliteStore::new(pool.clone(), DIMS);
    store.ensure_indexes().await.unwrap();

    let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('skills')")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert!(columns.iter().any(|c| c == "resolution"));
    assert!(!columns.iter().any(|c| c == "resolution_md"));

    let skill = store.fetch_skill("legacy-1").await.unwrap().unwrap();
    assert_eq!(skill.resolution, "1. Open tray");
    assert_eq!(skill.keywords, vec!["printer".to_string()]);

    // Legacy rows are searchable by keyword after the rebuild.
    let hits = store.keyword_search("tray", 5).await.unwrap();
    assert_eq!(hits.len(), 1);

    // A second run finds nothing left to migrate.
    store.ensure_indexes().await.unwrap();
    let skill = store.fetch_skill("legacy-1").await.unwrap().unwrap();
    assert_eq!(skill.resolution, "1. Open tray");
}

#[tokio::test]
async fn test_stored_embedding_of_wrong_length_is_rejected_on_read() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    let skill = library
        .new_skill(draft("Reset password", "cannot log in", &[], vec![0.1; DIMS]))
        .unwrap();
    library.create(&skill).await.unwrap();

    sqlx::query("UPDATE skills SET embedding = ? WHERE id = ?")
        .bind(skillbank_core::embedding::vec_to_blob(&[0.1, 0.2]))
        .bind(&skill.id)
        .execute(library.store().pool())
        .await
        .unwrap();

    let err = library.get(&skill.id).await.unwrap_err();
    assert!(matches!(err, SkillError::Validation(_)));
}

#[tokio::test]
async fn test_closed_pool_is_connectivity_error() {
    let dir = TempDir::new().unwrap();
    let library = ready_library(&dir).await;
    db::close(library.store().pool()).await;
    let err = library.get("anything").await.unwrap_err();
    assert!(matches!(err, SkillError::Connectivity(_)), "got {err:?}");
}
