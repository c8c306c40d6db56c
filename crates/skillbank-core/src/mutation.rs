//! Create, point-lookup, and versioned partial update of skills.
//!
//! Writes are strict: a create or update that the store reports as having
//! touched an unexpected number of records is surfaced as an error, never
//! as an empty result. Both writes return the record re-read from the
//! store so persistence is verified end to end.
//!
//! There is no compare-and-swap on `version`. Two concurrent updates of
//! the same id both succeed and the later write wins; callers that need
//! stronger isolation must serialize updates per id themselves.

use chrono::Utc;
use serde::Serialize;

use crate::dedup::check_duplicate;
use crate::embedding::validate_embedding;
use crate::error::{Result, SkillError};
use crate::models::{dedup_keywords, Skill, SkillPatch};
use crate::store::SkillStore;

/// Result of [`create_or_get`]: the stored skill and whether it is new.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    pub skill: Skill,
    pub created: bool,
}

/// Point lookup. A missing id is `Ok(None)`, not an error.
pub async fn get_skill<S: SkillStore + ?Sized>(store: &S, id: &str) -> Result<Option<Skill>> {
    store.fetch_skill(id).await
}

/// Write a new skill and return it as re-read from the store.
pub async fn create_skill<S: SkillStore + ?Sized>(
    store: &S,
    dims: usize,
    skill: &Skill,
) -> Result<Skill> {
    validate_embedding(skill.embedding(), dims, "create")?;

    let written = store.insert_skill(skill).await?;
    if written != 1 {
        return Err(SkillError::Consistency(format!(
            "create of skill {} wrote {written} records, expected 1",
            skill.id
        )));
    }

    let stored = store.fetch_skill(&skill.id).await?.ok_or_else(|| {
        SkillError::Consistency(format!(
            "skill {} was written but cannot be read back",
            skill.id
        ))
    })?;

    tracing::info!(skill_id = %stored.id, title = %stored.title, "skill created");
    Ok(stored)
}

/// Create `skill` unless a near-duplicate already exists.
///
/// On a duplicate hit the existing record is returned untouched with
/// `created = false`.
pub async fn create_or_get<S: SkillStore + ?Sized>(
    store: &S,
    dims: usize,
    skill: &Skill,
    duplicate_threshold: f64,
) -> Result<CreateOutcome> {
    if let Some(existing) = check_duplicate(store, dims, skill.embedding(), duplicate_threshold).await? {
        tracing::warn!(
            existing_id = %existing.id,
            candidate_title = %skill.title,
            "near-duplicate skill, returning existing record"
        );
        return Ok(CreateOutcome {
            skill: existing,
            created: false,
        });
    }

    let stored = create_skill(store, dims, skill).await?;
    Ok(CreateOutcome {
        skill: stored,
        created: true,
    })
}

/// Apply `patch` to skill `id`, bump its version by one, refresh
/// `updated_at`, and return the re-read record.
///
/// The patch is validated before anything is sent to the store, so an
/// embedding of the wrong length never reaches storage.
pub async fn update_skill<S: SkillStore + ?Sized>(
    store: &S,
    dims: usize,
    id: &str,
    mut patch: SkillPatch,
) -> Result<Skill> {
    patch.validate(dims)?;
    if let Some(keywords) = patch.keywords.take() {
        patch.keywords = Some(dedup_keywords(keywords));
    }

    let written = store.apply_patch(id, &patch, Utc::now()).await?;
    match written {
        0 => return Err(SkillError::NotFound(id.to_string())),
        1 => {}
        n => {
            return Err(SkillError::Consistency(format!(
                "update of skill {id} wrote {n} records, expected 1"
            )))
        }
    }

    let updated = store.fetch_skill(id).await?.ok_or_else(|| {
        SkillError::Consistency(format!("skill {id} was updated but cannot be read back"))
    })?;

    tracing::info!(
        skill_id = %updated.id,
        version = updated.version,
        fields = ?patch.changed_fields(),
        "skill updated"
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SkillDraft, SkillRecord};
    use crate::store::memory::InMemoryStore;

    const DIMS: usize = 4;

    fn draft(title: &str, embedding: Vec<f32>) -> SkillDraft {
        SkillDraft {
            title: title.to_string(),
            problem: "Customer cannot log in".to_string(),
            resolution: "# Steps\n**Do:** Reset password".to_string(),
            conditions: vec!["user is locked out".to_string()],
            keywords: vec!["password".to_string()],
            embedding,
            product_area: "auth".to_string(),
            issue_type: "how-to".to_string(),
        }
    }

    async fn ready_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.ensure_indexes().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let store = ready_store().await;
        let skill = Skill::create(draft("Password Reset", vec![0.1, 0.2, 0.3, 0.4]), DIMS).unwrap();
        let created = create_skill(&store, DIMS, &skill).await.unwrap();
        assert_eq!(created, skill);
        let fetched = get_skill(&store, &skill.id).await.unwrap();
        assert_eq!(fetched, Some(skill));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = ready_store().await;
        assert!(get_skill(&store, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_with_existing_id_is_consistency_fault() {
        let store = ready_store().await;
        let skill = Skill::create(draft("Password Reset", vec![0.1; DIMS]), DIMS).unwrap();
        create_skill(&store, DIMS, &skill).await.unwrap();
        let err = create_skill(&store, DIMS, &skill).await.unwrap_err();
        assert!(matches!(err, SkillError::Consistency(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_skill_built_for_other_dimension() {
        let store = ready_store().await;
        let skill = Skill::create(draft("Wide", vec![0.1; 6]), 6).unwrap();
        let err = create_skill(&store, DIMS, &skill).await.unwrap_err();
        assert!(matches!(err, SkillError::Validation(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_create_or_get_returns_existing_unmodified() {
        let store = ready_store().await;
        let e = vec![0.9, 0.1, 0.0, 0.2];
        let first = Skill::create(draft("Password Reset", e.clone()), DIMS).unwrap();
        let outcome = create_or_get(&store, DIMS, &first, 0.95).await.unwrap();
        assert!(outcome.created);

        let second = Skill::create(draft("Password Reset again", e), DIMS).unwrap();
        let outcome = create_or_get(&store, DIMS, &second, 0.95).await.unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.skill, first);
        assert_eq!(outcome.skill.version, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_increments_version_and_keeps_other_fields() {
        let store = ready_store().await;
        let mut record = SkillRecord::from(
            Skill::create(draft("Password Reset", vec![0.1; DIMS]), DIMS).unwrap(),
        );
        record.version = 3;
        let skill = Skill::from_record(record, DIMS).unwrap();
        store.insert_skill(&skill).await.unwrap();

        let patch = SkillPatch {
            title: Some("x".to_string()),
            ..Default::default()
        };
        let updated = update_skill(&store, DIMS, &skill.id, patch).await.unwrap();
        assert_eq!(updated.version, 4);
        assert_eq!(updated.title, "x");
        assert_eq!(updated.problem, skill.problem);
        assert_eq!(updated.created_at, skill.created_at);
        assert!(updated.updated_at >= skill.updated_at);
    }

    #[tokio::test]
    async fn test_update_with_no_fields_still_bumps_version() {
        let store = ready_store().await;
        let skill = Skill::create(draft("Password Reset", vec![0.1; DIMS]), DIMS).unwrap();
        create_skill(&store, DIMS, &skill).await.unwrap();
        let updated = update_skill(&store, DIMS, &skill.id, SkillPatch::default())
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_update_missing_id_is_not_found() {
        let store = ready_store().await;
        let err = update_skill(&store, DIMS, "missing", SkillPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::NotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_update_rejects_bad_embedding_before_write() {
        let store = ready_store().await;
        let skill = Skill::create(draft("Password Reset", vec![0.1; DIMS]), DIMS).unwrap();
        create_skill(&store, DIMS, &skill).await.unwrap();

        let patch = SkillPatch {
            embedding: Some(vec![0.1; DIMS + 2]),
            title: Some("changed".into()),
            ..Default::default()
        };
        let err = update_skill(&store, DIMS, &skill.id, patch).await.unwrap_err();
        assert!(matches!(err, SkillError::Validation(_)));

        let unchanged = get_skill(&store, &skill.id).await.unwrap().unwrap();
        assert_eq!(unchanged.version, 1);
        assert_eq!(unchanged.title, "Password Reset");
    }

    #[tokio::test]
    async fn test_update_replaces_embedding() {
        let store = ready_store().await;
        let skill = Skill::create(draft("Password Reset", vec![0.1; DIMS]), DIMS).unwrap();
        create_skill(&store, DIMS, &skill).await.unwrap();
        let patch = SkillPatch {
            embedding: Some(vec![0.0, 0.0, 1.0, 0.0]),
            ..Default::default()
        };
        let updated = update_skill(&store, DIMS, &skill.id, patch).await.unwrap();
        assert_eq!(updated.embedding(), &[0.0, 0.0, 1.0, 0.0]);
    }
}
