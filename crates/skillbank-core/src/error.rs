//! Error taxonomy shared by every engine operation.
//!
//! Each variant is a distinct failure class that callers are expected to
//! branch on. Nothing in the engine swallows these: `get` and
//! `check_duplicate` report "nothing found" as `Ok(None)`, every other
//! operation that cannot complete returns one of the variants below.

use thiserror::Error;

/// Failure classes surfaced by the skill engine.
#[derive(Debug, Error)]
pub enum SkillError {
    /// Malformed input, rejected before any I/O is issued.
    #[error("validation error: {0}")]
    Validation(String),

    /// A targeted-by-id operation addressed a record that does not exist.
    #[error("skill not found: {0}")]
    NotFound(String),

    /// The backing store is unreachable, closed, or timed out.
    #[error("store unavailable: {0}")]
    Connectivity(String),

    /// A write expected to affect exactly one record affected a different
    /// number. Never recoverable.
    #[error("consistency fault: {0}")]
    Consistency(String),

    /// Search was attempted before the indexes were created.
    #[error("missing index: {0}")]
    MissingIndex(String),

    /// Any other backend failure (malformed stored row, SQL error, ...).
    #[error("storage error: {0}")]
    Storage(String),
}

impl SkillError {
    /// Stable machine-readable code for this error class.
    pub fn code(&self) -> &'static str {
        match self {
            SkillError::Validation(_) => "validation",
            SkillError::NotFound(_) => "not_found",
            SkillError::Connectivity(_) => "connectivity",
            SkillError::Consistency(_) => "consistency",
            SkillError::MissingIndex(_) => "missing_index",
            SkillError::Storage(_) => "storage",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SkillError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SkillError>;
