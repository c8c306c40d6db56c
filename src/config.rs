//! TOML configuration parsing and validation.
//!
//! The embedding dimension `D` is read here, once, and then injected into
//! every component that needs it. `SKILLBANK_EMBEDDING_DIM`, when set,
//! overrides `[embedding].dims`.
//!
//! ```toml
//! [db]
//! path = "./data/skills.sqlite"
//!
//! [embedding]
//! provider = "hash"      # disabled | hash | openai
//! dims = 768
//!
//! [retrieval]
//! hybrid_alpha = 0.7
//! top_k = 5
//! duplicate_threshold = 0.95
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use skillbank_core::dedup::DEFAULT_DUPLICATE_THRESHOLD;
use skillbank_core::merge::{MergeParams, DEFAULT_HYBRID_ALPHA};
use skillbank_core::LibrarySettings;

/// Environment variable overriding `[embedding].dims`.
pub const DIMS_ENV_VAR: &str = "SKILLBANK_EMBEDDING_DIM";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: f64,
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: default_hybrid_alpha(),
            top_k: default_top_k(),
            min_score: 0.0,
            duplicate_threshold: default_duplicate_threshold(),
        }
    }
}

fn default_hybrid_alpha() -> f64 {
    DEFAULT_HYBRID_ALPHA
}
fn default_top_k() -> usize {
    5
}
fn default_duplicate_threshold() -> f64 {
    DEFAULT_DUPLICATE_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Engine settings derived from this config.
    pub fn library_settings(&self) -> LibrarySettings {
        let min_score = if self.retrieval.min_score > 0.0 {
            Some(self.retrieval.min_score)
        } else {
            None
        };
        LibrarySettings {
            dims: self.embedding.dims,
            merge: MergeParams {
                hybrid_alpha: self.retrieval.hybrid_alpha,
                min_score,
            },
            duplicate_threshold: self.retrieval.duplicate_threshold,
        }
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let dims_override = std::env::var(DIMS_ENV_VAR).ok();
    parse_config(&content, dims_override.as_deref())
}

/// Parse and validate config text, applying an optional dimension override.
pub fn parse_config(content: &str, dims_override: Option<&str>) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if let Some(raw) = dims_override {
        config.embedding.dims = raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a positive integer, got '{}'", DIMS_ENV_VAR, raw))?;
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.db.max_connections == 0 {
        bail!("db.max_connections must be >= 1");
    }

    let r = &config.retrieval;
    if r.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&r.hybrid_alpha) {
        bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&r.min_score) {
        bail!("retrieval.min_score must be in [0.0, 1.0]");
    }
    if !(0.0..=1.0).contains(&r.duplicate_threshold) {
        bail!("retrieval.duplicate_threshold must be in [0.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" => {}
        "openai" => {
            if config.embedding.model.is_none() {
                bail!("embedding.model must be specified when provider is 'openai'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "/tmp/skills.sqlite"
"#;

    #[test]
    fn test_defaults() {
        let config = parse_config(MINIMAL, None).unwrap();
        assert_eq!(config.embedding.dims, 768);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.hybrid_alpha - 0.7).abs() < 1e-12);
        assert!((config.retrieval.duplicate_threshold - 0.95).abs() < 1e-12);
        assert_eq!(config.db.max_connections, 5);
        assert_eq!(config.server.bind, "127.0.0.1:7341");

        let settings = config.library_settings();
        assert_eq!(settings.dims, 768);
        assert_eq!(settings.merge.min_score, None);
    }

    #[test]
    fn test_dims_override() {
        let config = parse_config(MINIMAL, Some("384")).unwrap();
        assert_eq!(config.embedding.dims, 384);
    }

    #[test]
    fn test_dims_override_must_parse() {
        assert!(parse_config(MINIMAL, Some("lots")).is_err());
        assert!(parse_config(MINIMAL, Some("0")).is_err());
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let text = format!("{MINIMAL}\n[retrieval]\nhybrid_alpha = 1.5\n");
        let err = parse_config(&text, None).unwrap_err();
        assert!(err.to_string().contains("hybrid_alpha"));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let text = format!("{MINIMAL}\n[retrieval]\ntop_k = 0\n");
        assert!(parse_config(&text, None).is_err());
    }

    #[test]
    fn test_openai_requires_model() {
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"openai\"\n");
        assert!(parse_config(&text, None).is_err());
    }

    #[test]
    fn test_unknown_provider() {
        let text = format!("{MINIMAL}\n[embedding]\nprovider = \"word2vec\"\n");
        let err = parse_config(&text, None).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_min_score_enters_settings() {
        let text = format!("{MINIMAL}\n[retrieval]\nmin_score = 0.4\n");
        let config = parse_config(&text, None).unwrap();
        assert_eq!(config.library_settings().merge.min_score, Some(0.4));
    }
}
