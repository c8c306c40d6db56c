//! Near-duplicate detection by nearest-neighbour lookup.

use crate::embedding::validate_embedding;
use crate::error::Result;
use crate::models::Skill;
use crate::store::SkillStore;

/// Similarity above which a new entry is treated as an existing record.
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.95;

/// Return the closest stored skill if its similarity strictly exceeds
/// `threshold`, otherwise `None`.
///
/// A hit is returned exactly as stored: no version bump, no field merge.
pub async fn check_duplicate<S: SkillStore + ?Sized>(
    store: &S,
    dims: usize,
    embedding: &[f32],
    threshold: f64,
) -> Result<Option<Skill>> {
    validate_embedding(embedding, dims, "check_duplicate")?;

    let nearest = store.vector_search(embedding, 1).await?.into_iter().next();

    Ok(match nearest {
        Some(cand) if cand.raw_score > threshold => {
            tracing::debug!(
                skill_id = %cand.skill.id,
                similarity = cand.raw_score,
                threshold,
                "duplicate found"
            );
            Some(cand.skill)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkillError;
    use crate::models::SkillDraft;
    use crate::store::memory::InMemoryStore;

    const DIMS: usize = 4;

    async fn store_with(embedding: Vec<f32>) -> (InMemoryStore, Skill) {
        let store = InMemoryStore::new();
        store.ensure_indexes().await.unwrap();
        let skill = Skill::create(
            SkillDraft {
                title: "Refund request".into(),
                problem: "Customer wants a refund".into(),
                resolution: "Issue refund".into(),
                embedding,
                ..Default::default()
            },
            DIMS,
        )
        .unwrap();
        store.insert_skill(&skill).await.unwrap();
        (store, skill)
    }

    #[tokio::test]
    async fn test_identical_embedding_is_duplicate() {
        let e = vec![0.3, 0.1, 0.9, 0.2];
        let (store, skill) = store_with(e.clone()).await;
        let hit = check_duplicate(&store, DIMS, &e, DEFAULT_DUPLICATE_THRESHOLD)
            .await
            .unwrap();
        assert_eq!(hit, Some(skill));
    }

    #[tokio::test]
    async fn test_different_embedding_is_not_duplicate() {
        let (store, _) = store_with(vec![1.0, 0.0, 0.0, 0.0]).await;
        let hit = check_duplicate(&store, DIMS, &[0.0, 1.0, 0.0, 0.0], 0.95)
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let e = vec![1.0, 0.0, 0.0, 0.0];
        let (store, _) = store_with(e.clone()).await;
        // identical vectors have similarity 1.0, which does not exceed 1.0
        let hit = check_duplicate(&store, DIMS, &e, 1.0).await.unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_empty_store_has_no_duplicate() {
        let store = InMemoryStore::new();
        store.ensure_indexes().await.unwrap();
        let hit = check_duplicate(&store, DIMS, &[0.5; DIMS], 0.95).await.unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let (store, _) = store_with(vec![0.5; DIMS]).await;
        let err = check_duplicate(&store, DIMS, &[0.5; 3], 0.95)
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::Validation(_)));
    }
}
