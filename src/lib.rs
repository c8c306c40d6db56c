//! # Skillbank
//!
//! A library of support playbooks ("skills") with hybrid retrieval,
//! near-duplicate detection, and versioned updates, served to AI agents
//! over a JSON tool API and MCP.
//!
//! The engine lives in [`skillbank_core`]; this crate supplies the SQLite
//! store, configuration, embedding providers, the tool surface, and the
//! `skb` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ skb CLI  │──▶│ ToolContext  │──▶│ SkillLibrary     │
//! └──────────┘   │ + embedder   │   │ (skillbank-core) │
//! ┌──────────┐   │              │   └────────┬─────────┘
//! │ HTTP/MCP │──▶│              │            ▼
//! └──────────┘   └──────────────┘   ┌──────────────────┐
//!                                   │ SqliteStore      │
//!                                   │ FTS5 + BLOB vecs │
//!                                   └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! skb init
//! skb add --file draft.json
//! skb search "customer cannot reset password" --explain
//! skb serve mcp
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Connection pool, health check, error classification |
//! | [`migrate`] | Tables, legacy migration, index registration |
//! | [`sqlite_store`] | `SkillStore` over SQLite |
//! | [`embedding`] | Embedding providers (disabled, hash, OpenAI) |
//! | [`tools`] | Tool trait, built-in skill tools, registry |
//! | [`server`] | HTTP tool API |
//! | [`mcp`] | MCP bridge over the tool registry |
//! | [`logging`] | Tracing subscriber setup |
//! | [`search`], [`get`], [`edit`] | CLI commands |

pub mod config;
pub mod db;
pub mod edit;
pub mod embedding;
pub mod get;
pub mod logging;
pub mod mcp;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod tools;
