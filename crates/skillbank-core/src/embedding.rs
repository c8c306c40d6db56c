//! Vector utilities: dimension checks, BLOB encoding, cosine similarity.
//!
//! The engine never computes embeddings. Callers supply pre-computed
//! vectors and every vector that enters the engine passes through
//! [`validate_embedding`] against the configured dimension `D`.

use crate::error::{Result, SkillError};

/// Fail fast if `embedding` does not have exactly `dims` components.
///
/// `context` names the operation in the error message (e.g. `"search"`).
pub fn validate_embedding(embedding: &[f32], dims: usize, context: &str) -> Result<()> {
    if embedding.is_empty() {
        return Err(SkillError::validation(format!(
            "embedding must not be empty ({context})"
        )));
    }
    if embedding.len() != dims {
        return Err(SkillError::validation(format!(
            "expected embedding dim {dims}, got {} ({context})",
            embedding.len()
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(SkillError::validation(format!(
            "embedding contains non-finite values ({context})"
        )));
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use skillbank_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Trailing bytes that do not form a whole `f32` are ignored; the
/// resulting length is then caught by [`validate_embedding`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors,
/// vectors of different lengths, or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let restored = blob_to_vec(&vec_to_blob(&vec));
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_validate_accepts_matching_dim() {
        assert!(validate_embedding(&[0.1; 8], 8, "test").is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_dim() {
        let err = validate_embedding(&[0.1; 7], 8, "search").unwrap_err();
        assert!(matches!(err, SkillError::Validation(_)));
        assert!(err.to_string().contains("expected embedding dim 8, got 7"));
        assert!(err.to_string().contains("search"));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = validate_embedding(&[], 8, "create").unwrap_err();
        assert!(matches!(err, SkillError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut v = vec![0.5f32; 4];
        v[2] = f32::NAN;
        assert!(validate_embedding(&v, 4, "update").is_err());
    }
}
