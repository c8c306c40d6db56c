//! Hybrid search over a [`SkillStore`].
//!
//! The caller supplies a pre-computed query embedding and the raw query
//! text. The engine never embeds anything itself.
//!
//! # Pipeline
//!
//! 1. Validate the embedding length against `D` and `top_k >= 1`.
//! 2. Fetch `2 × top_k` vector candidates.
//! 3. Fetch `2 × top_k` keyword candidates, unless the text is blank, in
//!    which case no keyword query is issued at all.
//! 4. Merge with [`merge`](crate::merge::merge) and truncate to `top_k`.

use crate::embedding::validate_embedding;
use crate::error::{Result, SkillError};
use crate::merge::{merge, MergeParams, ScoredSkill};
use crate::store::SkillStore;

/// Each source is over-fetched by this factor before merging.
pub const OVERFETCH_FACTOR: usize = 2;

/// Bundles all inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query_embedding: &'a [f32],
    pub query_text: &'a str,
    pub top_k: usize,
    pub params: MergeParams,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query_embedding: &'a [f32], query_text: &'a str, top_k: usize) -> Self {
        Self {
            query_embedding,
            query_text,
            top_k,
            params: MergeParams::default(),
        }
    }
}

/// Run a hybrid search against `store`.
pub async fn search<S: SkillStore + ?Sized>(
    store: &S,
    dims: usize,
    req: &SearchRequest<'_>,
) -> Result<Vec<ScoredSkill>> {
    validate_embedding(req.query_embedding, dims, "search")?;
    if req.top_k == 0 {
        return Err(SkillError::Validation("top_k must be >= 1".to_string()));
    }

    let fetch = req.top_k.saturating_mul(OVERFETCH_FACTOR);

    let vector_candidates = store.vector_search(req.query_embedding, fetch).await?;

    let keyword_candidates = if req.query_text.trim().is_empty() {
        Vec::new()
    } else {
        store.keyword_search(req.query_text.trim(), fetch).await?
    };

    tracing::debug!(
        vector = vector_candidates.len(),
        keyword = keyword_candidates.len(),
        fetch,
        "hybrid search candidates"
    );

    let mut results = merge(vector_candidates, keyword_candidates, &req.params);
    results.truncate(req.top_k);
    Ok(results)
}
