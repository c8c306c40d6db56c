//! `skb add` and `skb update`: author skills from JSON files.
//!
//! `add` reads a draft (`title`, `problem`, `resolution`, optional
//! `conditions`, `keywords`, `product_area`, `issue_type`, `embedding`).
//! `update` reads a partial patch with the same field names plus
//! `confidence`. Missing embeddings are computed by the configured
//! provider.

use anyhow::{Context, Result};
use std::path::Path;

use skillbank_core::{SkillDraft, SkillPatch};

use crate::config::Config;
use crate::db;
use crate::tools::ToolContext;

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub async fn run_add(config: &Config, file: &Path) -> Result<()> {
    let draft: SkillDraft = read_json(file)?;
    let ctx = ToolContext::open(config).await?;
    let outcome = ctx.create(draft).await;
    db::close(ctx.library().store().pool()).await;
    let outcome = outcome?;

    if outcome.created {
        println!("Created skill {}", outcome.skill.id);
    } else {
        println!(
            "Near-duplicate of existing skill {} ({}); nothing written.",
            outcome.skill.id, outcome.skill.title
        );
    }
    Ok(())
}

pub async fn run_update(config: &Config, id: &str, file: &Path) -> Result<()> {
    let patch: SkillPatch = read_json(file)?;
    let changes = patch.changed_fields();
    let ctx = ToolContext::open(config).await?;
    let updated = ctx.update(id, patch).await;
    db::close(ctx.library().store().pool()).await;
    let updated = updated?;

    println!(
        "Updated skill {} to version {} ({})",
        updated.id,
        updated.version,
        if changes.is_empty() {
            "no field changes".to_string()
        } else {
            changes.join(", ")
        }
    );
    Ok(())
}
