//! # Skillbank Core
//!
//! Retrieval and mutation engine for a library of skill playbooks:
//! the skill model, score merging, the store abstraction, hybrid search,
//! duplicate detection, and versioned updates.
//!
//! This crate contains no tokio, sqlx, filesystem, or network code. The
//! application crate supplies a [`store::SkillStore`] implementation and
//! pre-computed embeddings.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Skill`, `SkillDraft`, `SkillRecord`, `SkillPatch` |
//! | [`error`] | `SkillError` taxonomy |
//! | [`embedding`] | Dimension checks, BLOB encoding, cosine similarity |
//! | [`merge`] | Vector + keyword score merging |
//! | [`store`] | `SkillStore` trait and in-memory implementation |
//! | [`search`] | Hybrid search engine |
//! | [`dedup`] | Near-duplicate detection |
//! | [`mutation`] | Create / get / update |
//! | [`library`] | `SkillLibrary` facade bound to dimension `D` |

pub mod dedup;
pub mod embedding;
pub mod error;
pub mod library;
pub mod merge;
pub mod models;
pub mod mutation;
pub mod search;
pub mod store;

pub use error::{Result, SkillError};
pub use library::{LibrarySettings, SkillLibrary};
pub use merge::ScoredSkill;
pub use models::{Skill, SkillDraft, SkillPatch, SkillRecord};
pub use mutation::CreateOutcome;
