use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use guidebase_core::chunk::DEFAULT_MAX_TOKENS;
use guidebase_core::html::DEFAULT_CONTAINER;
use guidebase_core::retrieve::{DEFAULT_RESULT_LIMIT, DEFAULT_SIMILARITY_THRESHOLD};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// CSS selector of the HTML content container the chunker operates in.
    #[serde(default = "default_html_container")]
    pub html_container: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            html_container: default_html_container(),
        }
    }
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}
fn default_html_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Rows must score strictly above this to be returned.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Maximum rows per retrieval.
    #[serde(default = "default_result_limit")]
    pub limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            limit: default_result_limit(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

/// Provider settings for both embedding pipelines. The text and multimodal
/// pipelines are independent: each has its own provider, model, and fixed
/// dimensionality, and the dims must match the table the pipeline writes
/// to and queries.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_text_provider")]
    pub text: ProviderConfig,
    #[serde(default = "default_multimodal_provider")]
    pub multimodal: ProviderConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            text: default_text_provider(),
            multimodal: default_multimodal_provider(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// `"gemini"`, `"voyage"`, or `"stub"` (deterministic offline vectors).
    pub provider: String,
    pub model: String,
    pub dims: usize,
    /// Override the provider's API base URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        default_text_provider()
    }
}

fn default_text_provider() -> ProviderConfig {
    ProviderConfig {
        provider: "gemini".to_string(),
        model: "text-embedding-004".to_string(),
        dims: 768,
        url: None,
        timeout_secs: default_timeout_secs(),
    }
}

fn default_multimodal_provider() -> ProviderConfig {
    ProviderConfig {
        provider: "voyage".to_string(),
        model: "voyage-multimodal-3".to_string(),
        dims: 1024,
        url: None,
        timeout_secs: default_timeout_secs(),
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Insert a resource and its chunks in one transaction. `false`
    /// restores the legacy two-write behavior, which can leave an orphaned
    /// resource if the chunk insert fails.
    #[serde(default = "default_transactional")]
    pub transactional: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            transactional: default_transactional(),
        }
    }
}

fn default_transactional() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Maximum retrieval-tool invocations one chat turn may perform.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Which pipeline the `get_information` tool serves: `"text"` or
    /// `"multimodal"`. The two output shapes are never mixed in one
    /// deployment.
    #[serde(default = "default_pipeline")]
    pub pipeline: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            pipeline: default_pipeline(),
        }
    }
}

fn default_max_steps() -> usize {
    5
}
fn default_pipeline() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.limit < 1 {
        anyhow::bail!("retrieval.limit must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }

    for (name, provider) in [
        ("embedding.text", &config.embedding.text),
        ("embedding.multimodal", &config.embedding.multimodal),
    ] {
        if provider.dims == 0 {
            anyhow::bail!("{name}.dims must be > 0");
        }
        if provider.model.is_empty() {
            anyhow::bail!("{name}.model must not be empty");
        }
        match provider.provider.as_str() {
            "gemini" | "voyage" | "stub" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{other}'. Must be gemini, voyage, or stub."
            ),
        }
    }

    if config.chat.max_steps < 1 {
        anyhow::bail!("chat.max_steps must be >= 1");
    }
    match config.chat.pipeline.as_str() {
        "text" | "multimodal" => {}
        other => anyhow::bail!("Unknown chat.pipeline: '{other}'. Must be text or multimodal."),
    }

    Ok(config)
}
