//! `skb get`: print one skill.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

use skillbank_core::SkillLibrary;

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let settings = config.library_settings();
    let pool = db::connect(&config.db).await?;
    let library = SkillLibrary::new(SqliteStore::new(pool.clone(), settings.dims), settings);
    let found = library.get(id).await;
    db::close(&pool).await;

    let Some(skill) = found? else {
        bail!("skill not found: {}", id);
    };

    println!("--- Skill ---");
    println!("id:           {}", skill.id);
    println!("title:        {}", skill.title);
    println!("version:      {}", skill.version);
    println!("product_area: {}", skill.product_area);
    println!("issue_type:   {}", skill.issue_type);
    println!("confidence:   {:.2}", skill.confidence);
    println!("used:         {} (confirmed {})", skill.times_used, skill.times_confirmed);
    println!("created_at:   {}", skill.created_at.to_rfc3339());
    println!("updated_at:   {}", skill.updated_at.to_rfc3339());
    println!("keywords:     {}", skill.keywords.join(", "));
    println!();

    println!("--- Problem ---");
    println!("{}", skill.problem);
    println!();

    if !skill.conditions.is_empty() {
        println!("--- Conditions ---");
        for c in &skill.conditions {
            println!("- {}", c);
        }
        println!();
    }

    println!("--- Resolution ---");
    println!("{}", skill.resolution);

    Ok(())
}
