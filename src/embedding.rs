//! Embedding provider implementations.
//!
//! Every provider implements the core [`Embedder`] trait:
//! - **[`HuggingFaceEmbedder`]**: Hugging Face Inference feature-extraction pipeline (default).
//! - **[`OpenAIEmbedder`]**: OpenAI `POST /v1/embeddings`.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **[`LocalEmbedder`]**: in-process fastembed (feature `local-embeddings-fastembed`).
//! - **[`DisabledEmbedder`]**: always errors; lets read-only commands run without a provider.
//!
//! # Failure Policy
//!
//! Providers make exactly one request per call. Network errors, non-2xx
//! statuses, malformed bodies, and vectors whose length differs from the
//! configured dimension are all returned as errors; nothing is retried.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use portfolio_rag_core::embedding::Embedder;

use crate::config::EmbeddingConfig;

const DEFAULT_HF_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_HF_URL: &str = "https://router.huggingface.co/hf-inference";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build embedding HTTP client")
}

fn check_dims(provider: &str, vector: Vec<f32>, dims: usize) -> Result<Vec<f32>> {
    if vector.len() != dims {
        bail!(
            "{} returned a {}-dimensional embedding, expected {}",
            provider,
            vector.len(),
            dims
        );
    }
    Ok(vector)
}

async fn read_error_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

// ============ Disabled Provider ============

/// A no-op embedder that always returns errors.
///
/// Used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Hugging Face Provider ============

/// Embedding provider using the Hugging Face Inference API.
///
/// Calls `POST {url}/models/{model}/pipeline/feature-extraction` with
/// `{"inputs": text}`. The API key is read from `HUGGINGFACE_API_KEY`;
/// anonymous calls are attempted (and usually rate-limited) without one.
pub struct HuggingFaceEmbedder {
    model: String,
    dims: usize,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("HUGGINGFACE_API_KEY").ok();
        if api_key.is_none() {
            warn!("HUGGINGFACE_API_KEY not set; embedding requests will be anonymous");
        }
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_HF_MODEL.to_string());
        let base = config.url.as_deref().unwrap_or(DEFAULT_HF_URL);
        let endpoint = format!(
            "{}/models/{}/pipeline/feature-extraction",
            base.trim_end_matches('/'),
            model
        );

        Ok(Self {
            model,
            dims: config.dims,
            endpoint,
            api_key,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "inputs": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model = %self.model, chars = text.len(), "requesting feature extraction");
        let response = request
            .send()
            .await
            .with_context(|| format!("Hugging Face request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = read_error_body(response).await;
            bail!("Hugging Face API error {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await?;
        let vector = parse_feature_extraction(&json)?;
        check_dims("Hugging Face", vector, self.dims)
    }
}

/// Parse a feature-extraction response into one sentence vector.
///
/// Sentence-transformer models return a flat `[f32]`. Token-level models
/// return `[[f32]]` (one row per token), which is mean-pooled; a batch
/// wrapper `[[[f32]]]` is unwrapped to its first element first.
pub fn parse_feature_extraction(json: &serde_json::Value) -> Result<Vec<f32>> {
    let outer = json
        .as_array()
        .ok_or_else(|| anyhow!("Invalid feature-extraction response: expected an array"))?;

    match outer.first() {
        None => bail!("Invalid feature-extraction response: empty array"),
        Some(serde_json::Value::Number(_)) => to_f32_row(outer),
        Some(serde_json::Value::Array(inner)) => {
            if matches!(inner.first(), Some(serde_json::Value::Array(_))) {
                return parse_feature_extraction(&outer[0]);
            }
            let rows = outer
                .iter()
                .map(|row| {
                    row.as_array()
                        .ok_or_else(|| anyhow!("Invalid feature-extraction response: ragged rows"))
                        .and_then(|r| to_f32_row(r))
                })
                .collect::<Result<Vec<_>>>()?;
            mean_pool(&rows)
        }
        Some(_) => bail!("Invalid feature-extraction response: unexpected element type"),
    }
}

fn to_f32_row(values: &[serde_json::Value]) -> Result<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid feature-extraction response: non-numeric value"))
        })
        .collect()
}

fn mean_pool(rows: &[Vec<f32>]) -> Result<Vec<f32>> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 || rows.iter().any(|r| r.len() != width) {
        bail!("Invalid feature-extraction response: rows of unequal width");
    }
    let mut pooled = vec![0.0f32; width];
    for row in rows {
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
    }
    let n = rows.len() as f32;
    pooled.iter_mut().for_each(|v| *v /= n);
    Ok(pooled)
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable and an explicit
/// `embedding.model`.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims: config.dims,
            api_key,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(format!("{}/embeddings", DEFAULT_OPENAI_URL))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("OpenAI embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = read_error_body(response).await;
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let vector = parse_openai_response(&json)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))?;
        check_dims("OpenAI", vector, self.dims)
    }
}

/// Extract the `data[].embedding` arrays of an OpenAI embeddings response.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    data.iter()
        .map(|item| {
            let embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
            to_f32_row(embedding)
        })
        .collect()
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST {url}/api/embed` (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            model,
            dims: config.dims,
            url,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url,
                    e
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = read_error_body(response).await;
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let vector = parse_ollama_response(&json)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))?;
        check_dims("Ollama", vector, self.dims)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            let row = embedding
                .as_array()
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))?;
            to_f32_row(row)
        })
        .collect()
}

// ============ Local Provider (fastembed) ============

/// In-process embedding via fastembed.
///
/// The model is downloaded from Hugging Face on first use and cached; after
/// that no network calls are made. Inference runs on tokio's blocking pool.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;

        Ok(Self {
            model_name,
            dims: config.dims,
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported 384-dimensional models: \
             all-minilm-l6-v2, bge-small-en-v1.5, multilingual-e5-small",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let texts = vec![text.to_string()];

        let vector = tokio::task::spawn_blocking(move || -> Result<Vec<f32>> {
            let mut guard = model
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            let embeddings = guard
                .embed(texts, None)
                .map_err(|e| anyhow!("Local embedding failed: {}", e))?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("Empty embedding response"))
        })
        .await??;

        check_dims("fastembed", vector, self.dims)
    }
}

/// Create the [`Embedder`] named by `embedding.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"huggingface"` | [`HuggingFaceEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires `local-embeddings-fastembed`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "huggingface" => Ok(Arc::new(HuggingFaceEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hf_config(url: &str, dims: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "huggingface".to_string(),
            model: Some("test/mini".to_string()),
            dims,
            timeout_secs: 5,
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn test_parse_flat_vector() {
        let v = parse_feature_extraction(&json!([0.5, -1.0, 2.0])).unwrap();
        assert_eq!(v, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn test_parse_single_row() {
        let v = parse_feature_extraction(&json!([[1.0, 2.0]])).unwrap();
        assert_eq!(v, vec![1.0, 2.0]);
    }

    #[test]
    fn test_parse_token_rows_mean_pooled() {
        let v = parse_feature_extraction(&json!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(v, vec![2.0, 3.0]);
    }

    #[test]
    fn test_parse_batch_wrapper() {
        let v = parse_feature_extraction(&json!([[[1.0, 0.0], [3.0, 2.0]]])).unwrap();
        assert_eq!(v, vec![2.0, 1.0]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_feature_extraction(&json!({"error": "loading"})).is_err());
        assert!(parse_feature_extraction(&json!([])).is_err());
        assert!(parse_feature_extraction(&json!(["a", "b"])).is_err());
        assert!(parse_feature_extraction(&json!([[1.0], [1.0, 2.0]])).is_err());
    }

    #[test]
    fn test_parse_openai_response() {
        let body = json!({ "data": [ { "index": 0, "embedding": [0.25, 0.5] } ] });
        assert_eq!(parse_openai_response(&body).unwrap(), vec![vec![0.25, 0.5]]);
        assert!(parse_openai_response(&json!({})).is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        let body = json!({ "embeddings": [[1.0, 2.0, 3.0]] });
        assert_eq!(parse_ollama_response(&body).unwrap(), vec![vec![1.0, 2.0, 3.0]]);
        assert!(parse_ollama_response(&json!({ "embeddings": [1.0] })).is_err());
    }

    #[test]
    fn test_create_disabled() {
        let config = EmbeddingConfig {
            provider: "disabled".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "disabled");
    }

    #[test]
    fn test_create_unknown() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[tokio::test]
    async fn test_disabled_embed_errors() {
        assert!(DisabledEmbedder.embed("text").await.is_err());
    }

    #[tokio::test]
    async fn test_huggingface_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test/mini/pipeline/feature-extraction"))
            .and(header("authorization", "Bearer hf_test"))
            .and(body_json(json!({ "inputs": "hello world" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([0.1, 0.2, 0.3])))
            .expect(1)
            .mount(&server)
            .await;

        let embedder =
            HuggingFaceEmbedder::with_api_key(&hf_config(&server.uri(), 3), Some("hf_test".into()))
                .unwrap();
        let v = embedder.embed("hello world").await.unwrap();
        assert_eq!(v.len(), 3);
        assert!((v[1] - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_huggingface_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([0.1, 0.2])))
            .mount(&server)
            .await;

        let embedder = HuggingFaceEmbedder::with_api_key(&hf_config(&server.uri(), 384), None).unwrap();
        let err = embedder.embed("hello").await.unwrap_err().to_string();
        assert!(err.contains("expected 384"), "{err}");
    }

    #[tokio::test]
    async fn test_huggingface_error_status_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = HuggingFaceEmbedder::with_api_key(&hf_config(&server.uri(), 3), None).unwrap();
        let err = embedder.embed("hello").await.unwrap_err().to_string();
        assert!(err.contains("503"), "{err}");
    }
}
