use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub threat: ThreatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk window in bytes. Window edges snap to UTF-8
    /// character boundaries.
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    /// Overlap between consecutive chunks in bytes.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_chunk_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum similarity for a chunk to qualify as a result.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_score_threshold() -> f64 {
    0.0
}

/// Hard cap on `top_k` regardless of config or per-call values.
pub const MAX_TOP_K: usize = 500;

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"hash"` (local, deterministic) or `"openai"`.
    #[serde(default = "default_embedding_provider")]
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
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `"disabled"` or `"openai"`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "disabled".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_max_tokens() -> usize {
    500
}
fn default_llm_temperature() -> f32 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThreatConfig {
    /// Bonus added per corroborating detector beyond the strongest one.
    #[serde(default = "default_corroboration_bonus")]
    pub corroboration_bonus: f64,
    /// Extra trusted sender domains beyond the built-in list.
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    /// How many recent messages the workflow threat scan covers.
    #[serde(default = "default_scan_window")]
    pub scan_window: usize,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            corroboration_bonus: default_corroboration_bonus(),
            trusted_domains: Vec::new(),
            scan_window: default_scan_window(),
        }
    }
}

fn default_corroboration_bonus() -> f64 {
    0.1
}
fn default_scan_window() -> usize {
    50
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_chars == 0 {
        anyhow::bail!("chunking.chunk_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.chunk_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.chunk_chars");
    }

    if config.search.top_k == 0 || config.search.top_k > MAX_TOP_K {
        anyhow::bail!("search.top_k must be in 1..={}", MAX_TOP_K);
    }
    if !(0.0..=1.0).contains(&config.search.score_threshold) {
        anyhow::bail!("search.score_threshold must be in [0.0, 1.0]");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "hash" => {}
        "openai" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be specified for the openai provider");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash or openai.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be disabled or openai.", other),
    }

    if !(0.0..=1.0).contains(&config.threat.corroboration_bonus) {
        anyhow::bail!("threat.corroboration_bonus must be in [0.0, 1.0]");
    }

    Ok(())
}

impl Config {
    /// A config suitable for tests and ephemeral runs: hash embeddings,
    /// no LLM, database at the given path.
    pub fn for_db_path(path: PathBuf) -> Self {
        Self {
            db: DbConfig { path },
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            threat: ThreatConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::for_db_path(PathBuf::from("/tmp/ms.db"));
        assert!(validate(&config).is_ok());
        assert_eq!(config.chunking.chunk_chars, 500);
        assert_eq!(config.chunking.overlap_chars, 50);
        assert_eq!(config.embedding.provider, "hash");
        assert!(!config.llm.is_enabled());
    }

    #[test]
    fn test_rejects_overlap_not_below_chunk_size() {
        let mut config = Config::for_db_path(PathBuf::from("/tmp/ms.db"));
        config.chunking.overlap_chars = config.chunking.chunk_chars;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_unknown_providers() {
        let mut config = Config::for_db_path(PathBuf::from("/tmp/ms.db"));
        config.embedding.provider = "watson".to_string();
        assert!(validate(&config).is_err());

        let mut config = Config::for_db_path(PathBuf::from("/tmp/ms.db"));
        config.llm.provider = "granite".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_top_k_above_cap() {
        let mut config = Config::for_db_path(PathBuf::from("/tmp/ms.db"));
        config.search.top_k = MAX_TOP_K + 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_parses_minimal_toml() {
        let config: Config = toml::from_str("[db]\npath = \"data/mail.db\"\n").unwrap();
        assert!(validate(&config).is_ok());
        assert_eq!(config.search.top_k, 5);
    }
}
