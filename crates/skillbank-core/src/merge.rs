//! Score merging for hybrid retrieval.
//!
//! Combines a vector-similarity result set and a keyword-relevance result
//! set into one ranked list with scores in `[0, 1]`. Pure function, no I/O.
//!
//! # Algorithm
//!
//! 1. Clamp vector scores into `[0, 1]` (cosine similarity can go negative).
//! 2. Min-max normalize keyword scores over the keyword set; a tied or
//!    single-row set normalizes to `1.0` everywhere.
//! 3. If the keyword set returned rows: `score = α × vector + (1-α) × keyword`,
//!    a missing side contributing `0`. If it returned no rows: `score = vector`.
//!    The switch depends on rows returned, never on whether query text was
//!    supplied, so a text query that matches nothing is not capped at `α`.
//! 4. Clamp, then drop anything under `min_score`.
//! 5. Stable sort by score descending: ties keep vector order first, then
//!    keyword-only records in keyword order.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::Skill;
use crate::store::SkillCandidate;

/// Weight of the vector side when keyword rows are present.
pub const DEFAULT_HYBRID_ALPHA: f64 = 0.7;

/// Merge tuning, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeParams {
    /// `hybrid = α × vector + (1-α) × keyword` when keyword rows exist.
    pub hybrid_alpha: f64,
    /// Applied to the combined, clamped score only.
    pub min_score: Option<f64>,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            hybrid_alpha: DEFAULT_HYBRID_ALPHA,
            min_score: None,
        }
    }
}

/// A merged result: the skill, its combined score, and the per-source inputs.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSkill {
    pub skill: Skill,
    /// Combined score in `[0, 1]`.
    pub score: f64,
    /// Clamped vector score, if the skill came back from vector search.
    pub vector_score: Option<f64>,
    /// Normalized keyword score, if the skill came back from keyword search.
    pub keyword_score: Option<f64>,
}

/// Clamp into `[0, 1]`. NaN maps to `0`.
pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Min-max normalize raw keyword scores to `[0, 1]`, preserving order.
///
/// If all scores are equal (including the single-row case) every score
/// normalizes to `1.0`.
pub fn normalize_scores(candidates: &[SkillCandidate]) -> Vec<f64> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.raw_score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                clamp_unit((c.raw_score - s_min) / (s_max - s_min))
            }
        })
        .collect()
}

struct Entry {
    skill: Skill,
    vector: Option<f64>,
    keyword: Option<f64>,
}

/// Merge vector and keyword candidates into one ranked list.
pub fn merge(
    vector: Vec<SkillCandidate>,
    keyword: Vec<SkillCandidate>,
    params: &MergeParams,
) -> Vec<ScoredSkill> {
    let keyword_norm = normalize_scores(&keyword);
    let use_keyword = !keyword.is_empty();
    let alpha = clamp_unit(params.hybrid_alpha);

    let mut entries: Vec<Entry> = Vec::with_capacity(vector.len() + keyword.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for cand in vector {
        if position.contains_key(&cand.skill.id) {
            continue;
        }
        position.insert(cand.skill.id.clone(), entries.len());
        entries.push(Entry {
            vector: Some(clamp_unit(cand.raw_score)),
            keyword: None,
            skill: cand.skill,
        });
    }

    for (cand, norm) in keyword.into_iter().zip(keyword_norm) {
        match position.get(&cand.skill.id) {
            Some(&idx) => {
                let entry = &mut entries[idx];
                if entry.keyword.is_none() {
                    entry.keyword = Some(norm);
                }
            }
            None => {
                position.insert(cand.skill.id.clone(), entries.len());
                entries.push(Entry {
                    vector: None,
                    keyword: Some(norm),
                    skill: cand.skill,
                });
            }
        }
    }

    let mut merged: Vec<ScoredSkill> = entries
        .into_iter()
        .map(|e| {
            let v = e.vector.unwrap_or(0.0);
            let combined = if use_keyword {
                alpha * v + (1.0 - alpha) * e.keyword.unwrap_or(0.0)
            } else {
                v
            };
            ScoredSkill {
                skill: e.skill,
                score: clamp_unit(combined),
                vector_score: e.vector,
                keyword_score: e.keyword,
            }
        })
        .collect();

    if let Some(min_score) = params.min_score {
        merged.retain(|s| s.score >= min_score);
    }

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    merged
}
