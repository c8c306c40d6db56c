//! `skb search`: hybrid search from the command line.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::tools::ToolContext;

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    min_score: Option<f64>,
    explain: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("search requires embeddings. Set [embedding] provider in config.");
    }

    let ctx = ToolContext::open(config).await?;
    let results = ctx.search(query, limit, min_score, None).await;
    db::close(ctx.library().store().pool()).await;
    let results = results?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        let skill = &r.skill;
        println!("{}. [{:.2}] {}", i + 1, r.score, skill.title);
        if explain {
            println!(
                "    vector: {}  keyword: {}",
                fmt_component(r.vector_score),
                fmt_component(r.keyword_score)
            );
        }
        println!("    problem: \"{}\"", excerpt(&skill.problem, 160));
        if !skill.keywords.is_empty() {
            println!("    keywords: {}", skill.keywords.join(", "));
        }
        println!("    version: {}", skill.version);
        println!("    id: {}", skill.id);
        println!();
    }

    Ok(())
}

fn fmt_component(score: Option<f64>) -> String {
    score
        .map(|s| format!("{:.3}", s))
        .unwrap_or_else(|| "-".to_string())
}

/// First `max_chars` characters of `text` on a single line.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_short_text_unchanged() {
        assert_eq!(excerpt("cannot log in\n", 40), "cannot log in");
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_fmt_component() {
        assert_eq!(fmt_component(Some(0.5)), "0.500");
        assert_eq!(fmt_component(None), "-");
    }
}
