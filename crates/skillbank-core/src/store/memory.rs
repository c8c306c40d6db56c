//! In-memory [`SkillStore`] implementation for tests and embedded use.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, in insertion order.
//! Vector search is brute-force cosine similarity; keyword search counts
//! query terms found in the indexed text fields. Like a real backend, both
//! searches fail until [`ensure_indexes`](SkillStore::ensure_indexes) has
//! been called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::error::{Result, SkillError};
use crate::models::{Skill, SkillPatch};

use super::{SkillCandidate, SkillStore};

/// In-memory skill store.
pub struct InMemoryStore {
    skills: RwLock<Vec<Skill>>,
    indexed: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            skills: RwLock::new(Vec::new()),
            indexed: AtomicBool::new(false),
        }
    }

    /// Number of stored skills.
    pub fn len(&self) -> usize {
        self.skills.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn require_index(&self, name: &str) -> Result<()> {
        if self.indexed.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SkillError::MissingIndex(format!(
                "{name} does not exist; call ensure_indexes first"
            )))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> SkillError {
    SkillError::Storage("in-memory store lock poisoned".to_string())
}

/// Lowercased alphanumeric terms of `text`.
fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn sort_desc(candidates: &mut [SkillCandidate]) {
    candidates.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[async_trait]
impl SkillStore for InMemoryStore {
    async fn ensure_indexes(&self) -> Result<()> {
        self.indexed.store(true, Ordering::Release);
        Ok(())
    }

    async fn insert_skill(&self, skill: &Skill) -> Result<u64> {
        let mut skills = self.skills.write().map_err(poisoned)?;
        if skills.iter().any(|s| s.id == skill.id) {
            return Ok(0);
        }
        skills.push(skill.clone());
        Ok(1)
    }

    async fn fetch_skill(&self, id: &str) -> Result<Option<Skill>> {
        let skills = self.skills.read().map_err(poisoned)?;
        Ok(skills.iter().find(|s| s.id == id).cloned())
    }

    async fn apply_patch(
        &self,
        id: &str,
        patch: &SkillPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut skills = self.skills.write().map_err(poisoned)?;
        match skills.iter_mut().find(|s| s.id == id) {
            Some(slot) => {
                *slot = slot.with_patch(patch, updated_at);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn vector_search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<SkillCandidate>> {
        self.require_index("vector index skill_embedding")?;
        let skills = self.skills.read().map_err(poisoned)?;
        let mut candidates: Vec<SkillCandidate> = skills
            .iter()
            .map(|s| SkillCandidate {
                skill: s.clone(),
                raw_score: cosine_similarity(query_vec, s.embedding()) as f64,
            })
            .collect();
        sort_desc(&mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<SkillCandidate>> {
        self.require_index("full-text index skill_keywords")?;
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let skills = self.skills.read().map_err(poisoned)?;
        let mut candidates: Vec<SkillCandidate> = skills
            .iter()
            .filter_map(|s| {
                let indexed = terms(&format!(
                    "{} {} {} {}",
                    s.title,
                    s.problem,
                    s.resolution,
                    s.keywords.join(" ")
                ));
                let matches = query_terms
                    .iter()
                    .filter(|t| indexed.contains(*t))
                    .count();
                (matches > 0).then(|| SkillCandidate {
                    skill: s.clone(),
                    raw_score: matches as f64,
                })
            })
            .collect();
        sort_desc(&mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }
}
