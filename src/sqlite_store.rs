//! [`SkillStore`] backed by SQLite.
//!
//! Skills live in the `skills` table; list fields are JSON text, the
//! embedding is a little-endian `f32` BLOB, and timestamps are RFC 3339
//! strings with nanosecond precision. Keyword search goes through the
//! `skills_fts` FTS5 table ranked by BM25; vector search is brute-force
//! cosine similarity over every stored embedding.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use skillbank_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use skillbank_core::store::{SkillCandidate, SkillStore};
use skillbank_core::{Result, Skill, SkillError, SkillPatch, SkillRecord};

use crate::db::store_err;
use crate::migrate::{self, FULLTEXT_INDEX, VECTOR_INDEX};

const SKILL_COLUMNS: &str = "s.id, s.title, s.version, s.problem, s.resolution, s.conditions, \
     s.keywords, s.embedding, s.product_area, s.issue_type, s.confidence, s.times_used, \
     s.times_confirmed, s.created_at, s.updated_at";

/// SQLite skill store. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SkillError::Storage(format!("invalid {column} timestamp '{raw}': {e}")))
}

fn to_json(list: &[String]) -> Result<String> {
    serde_json::to_string(list).map_err(|e| SkillError::Storage(e.to_string()))
}

fn parse_list(raw: &str, column: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| SkillError::Storage(format!("invalid {column} list '{raw}': {e}")))
}

fn row_to_record(row: &SqliteRow) -> Result<SkillRecord> {
    let conditions: String = row.try_get("conditions").map_err(store_err)?;
    let keywords: String = row.try_get("keywords").map_err(store_err)?;
    let embedding: Vec<u8> = row.try_get("embedding").map_err(store_err)?;
    let created_at: String = row.try_get("created_at").map_err(store_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(store_err)?;

    Ok(SkillRecord {
        id: row.try_get("id").map_err(store_err)?,
        title: row.try_get("title").map_err(store_err)?,
        version: row.try_get("version").map_err(store_err)?,
        problem: row.try_get("problem").map_err(store_err)?,
        resolution: row.try_get("resolution").map_err(store_err)?,
        conditions: parse_list(&conditions, "conditions")?,
        keywords: parse_list(&keywords, "keywords")?,
        embedding: blob_to_vec(&embedding),
        product_area: row.try_get("product_area").map_err(store_err)?,
        issue_type: row.try_get("issue_type").map_err(store_err)?,
        confidence: row.try_get("confidence").map_err(store_err)?,
        times_used: row.try_get("times_used").map_err(store_err)?,
        times_confirmed: row.try_get("times_confirmed").map_err(store_err)?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

/// Turn free text into an FTS5 MATCH expression.
///
/// Each alphanumeric term is double-quoted so FTS5 operators and
/// punctuation in user input are never interpreted; terms are OR-joined.
/// Returns `None` when the text has no searchable term.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

#[async_trait]
impl SkillStore for SqliteStore {
    async fn ensure_indexes(&self) -> Result<()> {
        migrate::ensure_indexes(&self.pool, self.dims).await
    }

    async fn insert_skill(&self, skill: &Skill) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO skills (
                id, title, version, problem, resolution, conditions, keywords,
                embedding, product_area, issue_type, confidence, times_used,
                times_confirmed, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&skill.id)
        .bind(&skill.title)
        .bind(skill.version)
        .bind(&skill.problem)
        .bind(&skill.resolution)
        .bind(to_json(&skill.conditions)?)
        .bind(to_json(&skill.keywords)?)
        .bind(vec_to_blob(skill.embedding()))
        .bind(&skill.product_area)
        .bind(&skill.issue_type)
        .bind(skill.confidence)
        .bind(skill.times_used)
        .bind(skill.times_confirmed)
        .bind(timestamp(&skill.created_at))
        .bind(timestamp(&skill.updated_at))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected())
    }

    async fn fetch_skill(&self, id: &str) -> Result<Option<Skill>> {
        let row = sqlx::query(&format!("SELECT {SKILL_COLUMNS} FROM skills s WHERE s.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        match row {
            Some(row) => Ok(Some(Skill::from_record(row_to_record(&row)?, self.dims)?)),
            None => Ok(None),
        }
    }

    async fn apply_patch(
        &self,
        id: &str,
        patch: &SkillPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE skills SET ");
        let mut sets = qb.separated(", ");

        if let Some(title) = &patch.title {
            sets.push("title = ").push_bind_unseparated(title.clone());
        }
        if let Some(problem) = &patch.problem {
            sets.push("problem = ").push_bind_unseparated(problem.clone());
        }
        if let Some(resolution) = &patch.resolution {
            sets.push("resolution = ").push_bind_unseparated(resolution.clone());
        }
        if let Some(conditions) = &patch.conditions {
            sets.push("conditions = ").push_bind_unseparated(to_json(conditions)?);
        }
        if let Some(keywords) = &patch.keywords {
            sets.push("keywords = ").push_bind_unseparated(to_json(keywords)?);
        }
        if let Some(embedding) = &patch.embedding {
            sets.push("embedding = ").push_bind_unseparated(vec_to_blob(embedding));
        }
        if let Some(product_area) = &patch.product_area {
            sets.push("product_area = ").push_bind_unseparated(product_area.clone());
        }
        if let Some(issue_type) = &patch.issue_type {
            sets.push("issue_type = ").push_bind_unseparated(issue_type.clone());
        }
        if let Some(confidence) = patch.confidence {
            sets.push("confidence = ").push_bind_unseparated(confidence);
        }
        sets.push("version = version + 1");
        sets.push("updated_at = ").push_bind_unseparated(timestamp(&updated_at));

        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected())
    }

    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<SkillCandidate>> {
        migrate::require_index(&self.pool, VECTOR_INDEX).await?;

        let rows = sqlx::query(&format!("SELECT {SKILL_COLUMNS} FROM skills s"))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let skill = Skill::from_record(row_to_record(row)?, self.dims)?;
            let raw_score = cosine_similarity(query_vec, skill.embedding()) as f64;
            candidates.push(SkillCandidate { skill, raw_score });
        }

        candidates.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<SkillCandidate>> {
        migrate::require_index(&self.pool, FULLTEXT_INDEX).await?;

        let Some(match_expr) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(&format!(
            r#"
            SELECT {SKILL_COLUMNS}, bm25(skills_fts) AS bm25_rank
            FROM skills_fts
            JOIN skills s ON s.rowid = skills_fts.rowid
            WHERE skills_fts MATCH ?
            ORDER BY bm25_rank
            LIMIT ?
            "#
        ))
        .bind(match_expr)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter()
            .map(|row| {
                let rank: f64 = row.try_get("bm25_rank").map_err(store_err)?;
                Ok(SkillCandidate {
                    skill: Skill::from_record(row_to_record(row)?, self.dims)?,
                    // bm25 is lower-is-better
                    raw_score: -rank,
                })
            })
            .collect()
    }
}
