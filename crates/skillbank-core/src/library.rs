//! [`SkillLibrary`]: a store bound to the configured embedding dimension.
//!
//! This is the public operation surface. It is constructed explicitly
//! and passed to whoever needs it; there is no global instance. Cloning
//! is cheap when `S` is itself a cheap handle (e.g. a pooled connection).

use crate::dedup::{self, DEFAULT_DUPLICATE_THRESHOLD};
use crate::error::Result;
use crate::merge::{MergeParams, ScoredSkill};
use crate::models::{Skill, SkillDraft, SkillPatch};
use crate::mutation::{self, CreateOutcome};
use crate::search::{self, SearchRequest};
use crate::store::SkillStore;

/// Engine-level settings read once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LibrarySettings {
    /// Embedding dimension `D`.
    pub dims: usize,
    pub merge: MergeParams,
    pub duplicate_threshold: f64,
}

impl LibrarySettings {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            merge: MergeParams::default(),
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkillLibrary<S> {
    store: S,
    settings: LibrarySettings,
}

impl<S: SkillStore> SkillLibrary<S> {
    pub fn new(store: S, settings: LibrarySettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    pub fn dims(&self) -> usize {
        self.settings.dims
    }

    /// Build a new skill from `draft` using this library's dimension.
    pub fn new_skill(&self, draft: SkillDraft) -> Result<Skill> {
        Skill::create(draft, self.settings.dims)
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.store.ensure_indexes().await
    }

    /// Hybrid search with the configured merge settings.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredSkill>> {
        let req = SearchRequest {
            query_embedding,
            query_text,
            top_k,
            params: self.settings.merge,
        };
        search::search(&self.store, self.settings.dims, &req).await
    }

    /// Hybrid search with a per-call minimum score.
    pub async fn search_with_min_score(
        &self,
        query_embedding: &[f32],
        query_text: &str,
        top_k: usize,
        min_score: Option<f64>,
    ) -> Result<Vec<ScoredSkill>> {
        let req = SearchRequest {
            query_embedding,
            query_text,
            top_k,
            params: MergeParams {
                min_score,
                ..self.settings.merge
            },
        };
        search::search(&self.store, self.settings.dims, &req).await
    }

    /// Duplicate check; `threshold` defaults to the configured one.
    pub async fn check_duplicate(
        &self,
        embedding: &[f32],
        threshold: Option<f64>,
    ) -> Result<Option<Skill>> {
        let threshold = threshold.unwrap_or(self.settings.duplicate_threshold);
        dedup::check_duplicate(&self.store, self.settings.dims, embedding, threshold).await
    }

    pub async fn create(&self, skill: &Skill) -> Result<Skill> {
        mutation::create_skill(&self.store, self.settings.dims, skill).await
    }

    pub async fn create_or_get(&self, skill: &Skill) -> Result<CreateOutcome> {
        mutation::create_or_get(
            &self.store,
            self.settings.dims,
            skill,
            self.settings.duplicate_threshold,
        )
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Skill>> {
        mutation::get_skill(&self.store, id).await
    }

    pub async fn update(&self, id: &str, patch: SkillPatch) -> Result<Skill> {
        mutation::update_skill(&self.store, self.settings.dims, id, patch).await
    }
}
