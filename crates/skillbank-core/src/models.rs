//! The skill record and the shapes used to create, rebuild, and patch it.
//!
//! A [`Skill`] can only be constructed through [`Skill::create`] (fresh
//! record) or [`Skill::from_record`] (reconstruction from storage or any
//! other raw source). Both paths check the embedding against the
//! configured dimension, so a `Skill` value in hand always carries a
//! `D`-length vector. The embedding field is private for that reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::validate_embedding;
use crate::error::{Result, SkillError};

/// Default confidence assigned to a freshly created skill.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// A stored problem/resolution playbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skill {
    pub id: String,
    pub title: String,
    pub version: i64,
    pub problem: String,
    /// Playbook body handed back to the caller. Never embedded.
    pub resolution: String,
    pub conditions: Vec<String>,
    pub keywords: Vec<String>,
    embedding: Vec<f32>,
    pub product_area: String,
    pub issue_type: String,
    pub confidence: f64,
    pub times_used: i64,
    pub times_confirmed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller input for a brand-new skill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillDraft {
    pub title: String,
    pub problem: String,
    pub resolution: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub product_area: String,
    #[serde(default)]
    pub issue_type: String,
}

impl SkillDraft {
    /// Text a collaborator should embed for this draft.
    pub fn embedding_text(&self) -> String {
        compose_embedding_text(&self.problem, &self.conditions, &self.keywords)
    }
}

/// Raw, unchecked field set of a skill, as read from storage.
///
/// Turn it into a [`Skill`] with [`Skill::from_record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub id: String,
    pub title: String,
    pub version: i64,
    pub problem: String,
    pub resolution: String,
    pub conditions: Vec<String>,
    pub keywords: Vec<String>,
    pub embedding: Vec<f32>,
    pub product_area: String,
    pub issue_type: String,
    pub confidence: f64,
    pub times_used: i64,
    pub times_confirmed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Skill {
    /// Build a new version-1 skill from a draft.
    ///
    /// Assigns a UUID, default confidence, zero counters, and
    /// `created_at == updated_at == now`. Keywords are de-duplicated.
    pub fn create(draft: SkillDraft, dims: usize) -> Result<Skill> {
        if draft.title.trim().is_empty() {
            return Err(SkillError::validation("title must not be empty"));
        }
        if draft.problem.trim().is_empty() {
            return Err(SkillError::validation("problem must not be empty"));
        }
        validate_embedding(&draft.embedding, dims, "create")?;

        let now = Utc::now();
        Ok(Skill {
            id: uuid::Uuid::new_v4().to_string(),
            title: draft.title,
            version: 1,
            problem: draft.problem,
            resolution: draft.resolution,
            conditions: draft.conditions,
            keywords: dedup_keywords(draft.keywords),
            embedding: draft.embedding,
            product_area: draft.product_area,
            issue_type: draft.issue_type,
            confidence: DEFAULT_CONFIDENCE,
            times_used: 0,
            times_confirmed: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a skill from a raw record, enforcing the model invariants.
    pub fn from_record(record: SkillRecord, dims: usize) -> Result<Skill> {
        validate_embedding(&record.embedding, dims, "reconstruct")?;
        if record.id.is_empty() {
            return Err(SkillError::validation("id must not be empty"));
        }
        if record.version < 1 {
            return Err(SkillError::validation(format!(
                "version must be >= 1, got {} (skill {})",
                record.version, record.id
            )));
        }
        check_confidence(record.confidence)?;
        if record.times_used < 0 || record.times_confirmed < 0 {
            return Err(SkillError::validation(format!(
                "usage counters must be non-negative (skill {})",
                record.id
            )));
        }

        Ok(Skill {
            id: record.id,
            title: record.title,
            version: record.version,
            problem: record.problem,
            resolution: record.resolution,
            conditions: record.conditions,
            keywords: record.keywords,
            embedding: record.embedding,
            product_area: record.product_area,
            issue_type: record.issue_type,
            confidence: record.confidence,
            times_used: record.times_used,
            times_confirmed: record.times_confirmed,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    /// `problem`, `conditions`, and `keywords`, space-joined.
    ///
    /// This is the only skill content that may be embedded; the
    /// resolution body is deliberately absent.
    pub fn embedding_text(&self) -> String {
        compose_embedding_text(&self.problem, &self.conditions, &self.keywords)
    }

    /// Return the next version of this skill with `patch` applied.
    ///
    /// The version goes up by exactly one and `updated_at` is set to
    /// `updated_at` regardless of which fields the patch carries. The
    /// patch must already have been validated against `D`.
    pub fn with_patch(&self, patch: &SkillPatch, updated_at: DateTime<Utc>) -> Skill {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(problem) = &patch.problem {
            next.problem = problem.clone();
        }
        if let Some(resolution) = &patch.resolution {
            next.resolution = resolution.clone();
        }
        if let Some(conditions) = &patch.conditions {
            next.conditions = conditions.clone();
        }
        if let Some(keywords) = &patch.keywords {
            next.keywords = keywords.clone();
        }
        if let Some(embedding) = &patch.embedding {
            next.embedding = embedding.clone();
        }
        if let Some(product_area) = &patch.product_area {
            next.product_area = product_area.clone();
        }
        if let Some(issue_type) = &patch.issue_type {
            next.issue_type = issue_type.clone();
        }
        if let Some(confidence) = patch.confidence {
            next.confidence = confidence;
        }
        next.version += 1;
        next.updated_at = updated_at;
        next
    }
}

impl From<Skill> for SkillRecord {
    fn from(skill: Skill) -> Self {
        SkillRecord {
            id: skill.id,
            title: skill.title,
            version: skill.version,
            problem: skill.problem,
            resolution: skill.resolution,
            conditions: skill.conditions,
            keywords: skill.keywords,
            embedding: skill.embedding,
            product_area: skill.product_area,
            issue_type: skill.issue_type,
            confidence: skill.confidence,
            times_used: skill.times_used,
            times_confirmed: skill.times_confirmed,
            created_at: skill.created_at,
            updated_at: skill.updated_at,
        }
    }
}

/// Partial update of a skill.
///
/// `None` means "leave unchanged"; `Some` of an empty value is an
/// explicit overwrite with that empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl SkillPatch {
    /// Check the supplied fields before any write is issued.
    ///
    /// Only the embedding dimension and the confidence range are checked;
    /// text and list contents are taken as given.
    pub fn validate(&self, dims: usize) -> Result<()> {
        if let Some(embedding) = &self.embedding {
            validate_embedding(embedding, dims, "update")?;
        }
        if let Some(confidence) = self.confidence {
            check_confidence(confidence)?;
        }
        Ok(())
    }

    /// True if the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Names of the fields this patch sets, in schema order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.problem.is_some() {
            fields.push("problem");
        }
        if self.resolution.is_some() {
            fields.push("resolution");
        }
        if self.conditions.is_some() {
            fields.push("conditions");
        }
        if self.keywords.is_some() {
            fields.push("keywords");
        }
        if self.embedding.is_some() {
            fields.push("embedding");
        }
        if self.product_area.is_some() {
            fields.push("product_area");
        }
        if self.issue_type.is_some() {
            fields.push("issue_type");
        }
        if self.confidence.is_some() {
            fields.push("confidence");
        }
        fields
    }

    /// True if the patch changes any of the embedded fields.
    pub fn touches_embedding_text(&self) -> bool {
        self.problem.is_some() || self.conditions.is_some() || self.keywords.is_some()
    }
}

/// Join problem, conditions, and keywords into one embeddable string.
pub fn compose_embedding_text(problem: &str, conditions: &[String], keywords: &[String]) -> String {
    [problem.to_string(), conditions.join(" "), keywords.join(" ")]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop repeated keywords (case-insensitive), keeping first occurrences.
pub fn dedup_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .filter(|k| seen.insert(k.trim().to_lowercase()))
        .collect()
}

fn check_confidence(confidence: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(SkillError::validation(format!(
            "confidence must be in [0, 1], got {confidence}"
        )));
    }
    Ok(())
}
