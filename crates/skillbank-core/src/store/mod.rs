//! Storage abstraction for the skill library.
//!
//! The [`SkillStore`] trait is the only seam between the engine and a
//! backing database. The engine modules ([`search`](crate::search),
//! [`dedup`](crate::dedup), [`mutation`](crate::mutation)) are written
//! against it, so the SQLite store in the application crate and the
//! [`memory::InMemoryStore`] used in tests run the exact same logic.
//!
//! Implementations must be `Send + Sync` and must not hold mutable state
//! beyond the connection handle: every method is called concurrently.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Skill, SkillPatch};

/// A skill returned from one retrieval source with that source's raw score.
///
/// For vector search the score is cosine similarity; for keyword search it
/// is an unbounded relevance value where larger is better.
#[derive(Debug, Clone)]
pub struct SkillCandidate {
    pub skill: Skill,
    pub raw_score: f64,
}

/// Abstract storage backend for skills.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_indexes`](SkillStore::ensure_indexes) | Create vector/full-text indexes, migrate legacy fields |
/// | [`insert_skill`](SkillStore::insert_skill) | Write a new record, report rows written |
/// | [`fetch_skill`](SkillStore::fetch_skill) | Point lookup by id |
/// | [`apply_patch`](SkillStore::apply_patch) | Atomic partial update + version bump, report rows written |
/// | [`vector_search`](SkillStore::vector_search) | Nearest neighbours by cosine similarity |
/// | [`keyword_search`](SkillStore::keyword_search) | Full-text relevance search |
#[async_trait]
pub trait SkillStore: Send + Sync {
    /// Idempotently create the indexes and run one-time migrations.
    async fn ensure_indexes(&self) -> Result<()>;

    /// Insert `skill` if no record with its id exists.
    ///
    /// Returns the number of records written (0 or 1); never overwrites.
    async fn insert_skill(&self, skill: &Skill) -> Result<u64>;

    /// Fetch a skill by id.
    async fn fetch_skill(&self, id: &str) -> Result<Option<Skill>>;

    /// Apply `patch` to the record with `id` in one atomic write.
    ///
    /// The write also sets `version = version + 1` and `updated_at`.
    /// Returns the number of records written (0 when `id` is unknown).
    async fn apply_patch(
        &self,
        id: &str,
        patch: &SkillPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Top `limit` skills by cosine similarity to `query_vec`, best first.
    ///
    /// Fails with [`MissingIndex`](crate::error::SkillError::MissingIndex)
    /// if the vector index has not been created.
    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<SkillCandidate>>;

    /// Top `limit` skills by full-text relevance to `query`, best first.
    ///
    /// Fails with [`MissingIndex`](crate::error::SkillError::MissingIndex)
    /// if the full-text index has not been created.
    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<SkillCandidate>>;
}
