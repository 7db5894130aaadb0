//! TOML configuration parsing and validation.
//!
//! Only `[store]` is required; every other section falls back to the
//! defaults below, which reproduce the original deployment
//! (MiniLM embeddings on Hugging Face, GPT-3.5 via OpenRouter).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use portfolio_rag_core::retrieval::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Locations of the two persisted artifacts.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (Hugging Face router or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            timeout_secs: default_embedding_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "huggingface".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_llm_model() -> String {
    "openai/gpt-3.5-turbo".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_list_k")]
    pub list_k: usize,
    #[serde(default = "default_chat_k")]
    pub chat_k: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_recent_previews")]
    pub recent_previews: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            list_k: default_list_k(),
            chat_k: default_chat_k(),
            preview_chars: default_preview_chars(),
            recent_previews: default_recent_previews(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_list_k() -> usize {
    15
}
fn default_chat_k() -> usize {
    1
}
fn default_preview_chars() -> usize {
    200
}
fn default_recent_previews() -> usize {
    5
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            default_k: self.default_k,
            list_k: self.list_k,
        }
    }
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
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.store.index_path == config.store.metadata_path {
        anyhow::bail!("store.index_path and store.metadata_path must differ");
    }

    // Validate retrieval
    let r = &config.retrieval;
    if r.default_k == 0 || r.list_k == 0 || r.chat_k == 0 {
        anyhow::bail!("retrieval.default_k, list_k and chat_k must be >= 1");
    }
    if r.preview_chars == 0 {
        anyhow::bail!("retrieval.preview_chars must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() && config.embedding.dims == 0 {
        anyhow::bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    match config.embedding.provider.as_str() {
        "disabled" | "huggingface" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, huggingface, openai, ollama, or local.",
            other
        ),
    }

    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    Ok(config)
}
