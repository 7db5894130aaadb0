//! The question-answering pipeline behind every entry point.
//!
//! [`Assistant`] owns the retriever (and through it the embedder and the
//! vector store) plus the completion client, and exposes the four
//! operations the HTTP server and CLI share:
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | [`ingest_text`](Assistant::ingest_text) / [`ingest_file`](Assistant::ingest_file) | embed and append one chunk |
//! | [`chat`](Assistant::chat) | nearest stored chunk, no LLM |
//! | [`answer`](Assistant::answer) | retrieve → prompt → LLM → post-process |
//! | [`inspect`](Assistant::inspect) | count and previews of stored chunks |
//!
//! # Answer flow
//!
//! ```text
//! query ─┬─ greeting? ──────────────────────────────▶ introduction
//!        └─ retrieve(k by intent) ─▶ build_prompt ─▶ LLM ─▶ postprocess
//! ```
//!
//! Completion failures and embedding failures become answer text rather
//! than request errors; retrieval misses become the fallback message.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use portfolio_rag_core::answer::{postprocess, GREETING_INTRO};
use portfolio_rag_core::intent::{classify_topic, is_greeting, Intent};
use portfolio_rag_core::models::Chunk;
use portfolio_rag_core::prompt::{build_prompt, join_context};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{extract_text, ExtractError};
use crate::llm::{CompletionClient, OpenRouterClient};
use crate::retriever::{RetrievalError, Retriever};
use crate::store::VectorStore;

/// Sentinel returned by [`Assistant::chat`] when nothing is stored.
pub const NO_MATCH: &str = "No match found.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("No input")]
    MissingInput,
    #[error("No query provided.")]
    EmptyQuery,
    #[error("No text could be extracted from {0}")]
    EmptyExtraction(String),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),
    #[error("vector store error: {0:#}")]
    Store(anyhow::Error),
}

impl AssistantError {
    /// True for errors caused by the request itself rather than a service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AssistantError::MissingInput
                | AssistantError::EmptyQuery
                | AssistantError::EmptyExtraction(_)
                | AssistantError::Extract(_)
        )
    }
}

impl From<RetrievalError> for AssistantError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::Embedding(e) => AssistantError::Embedding(e),
            RetrievalError::Store(e) => AssistantError::Store(e),
        }
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub msg: String,
    /// Previews of the most recently stored chunks, oldest first.
    pub last_texts: Vec<String>,
    /// Preview of the extracted file text (file uploads only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<String>,
}

/// Result of a RAG query.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub query: String,
    /// Retrieved chunks joined with the context separator.
    pub context: String,
    pub answer: String,
    #[serde(skip)]
    pub intent: Intent,
}

/// Read-only view of the store for debugging.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub count: usize,
    pub texts: Vec<String>,
}

/// First `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// First `max_chars` characters, with `"..."` appended when truncated.
pub fn preview_with_ellipsis(text: &str, max_chars: usize) -> String {
    let mut out = preview(text, max_chars);
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

pub struct Assistant {
    retriever: Retriever,
    llm: Arc<dyn CompletionClient>,
    model: String,
    chat_k: usize,
    preview_chars: usize,
    recent_previews: usize,
}

impl Assistant {
    pub fn new(config: &Config, retriever: Retriever, llm: Arc<dyn CompletionClient>) -> Self {
        Self {
            retriever,
            llm,
            model: config.llm.model.clone(),
            chat_k: config.retrieval.chat_k,
            preview_chars: config.retrieval.preview_chars,
            recent_previews: config.retrieval.recent_previews,
        }
    }

    /// Wire the production components described by `config`: the
    /// persisted store, the configured embedder, and OpenRouter.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let store = Arc::new(VectorStore::open(&config.store, config.embedding.dims)?);
        let llm = Arc::new(OpenRouterClient::new(&config.llm)?);
        let retriever = Retriever::new(embedder, store, config.retrieval.params());
        retriever.check_dims()?;
        Ok(Self::new(config, retriever, llm))
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        self.retriever.store()
    }

    /// Embed `text` and append it to the store.
    ///
    /// Blank text is rejected before any external call.
    pub async fn ingest_text(&self, text: &str) -> Result<IngestReport, AssistantError> {
        if text.trim().is_empty() {
            return Err(AssistantError::MissingInput);
        }
        self.store_chunk(text).await?;
        Ok(IngestReport {
            msg: "Text embedded and saved".to_string(),
            last_texts: self.recent_previews()?,
            extracted: None,
        })
    }

    /// Extract text from an uploaded file and append it as one chunk.
    ///
    /// Extraction runs on the blocking pool; PDF parsing is CPU-bound.
    pub async fn ingest_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestReport, AssistantError> {
        let name = file_name.to_string();
        let extracted = tokio::task::spawn_blocking(move || extract_text(&name, &bytes))
            .await
            .map_err(|e| AssistantError::Store(e.into()))??;
        if extracted.trim().is_empty() {
            return Err(AssistantError::EmptyExtraction(file_name.to_string()));
        }
        self.store_chunk(&extracted).await?;
        Ok(IngestReport {
            msg: "File embedded and saved".to_string(),
            last_texts: self.recent_previews()?,
            extracted: Some(format!("{}...", preview(&extracted, self.preview_chars))),
        })
    }

    async fn store_chunk(&self, text: &str) -> Result<usize, AssistantError> {
        let embedding = self
            .retriever
            .embedder()
            .embed(text)
            .await
            .map_err(AssistantError::Embedding)?;

        let chunk = Chunk {
            text: text.to_string(),
            embedding,
        };
        let store = Arc::clone(self.store());
        let position = tokio::task::spawn_blocking(move || store.append(&chunk.text, &chunk.embedding))
            .await
            .map_err(|e| AssistantError::Store(e.into()))?
            .map_err(AssistantError::Store)?;

        info!(position, chars = text.len(), "chunk ingested");
        Ok(position)
    }

    fn recent_previews(&self) -> Result<Vec<String>, AssistantError> {
        Ok(self
            .store()
            .recent(self.recent_previews)
            .map_err(AssistantError::Store)?
            .iter()
            .map(|t| preview(t, self.preview_chars))
            .collect())
    }

    /// Return the single nearest chunk's text, or [`NO_MATCH`].
    pub async fn chat(&self, query: &str) -> Result<String, AssistantError> {
        if query.trim().is_empty() {
            return Err(AssistantError::EmptyQuery);
        }
        if self.store().is_empty().map_err(AssistantError::Store)? {
            return Ok(NO_MATCH.to_string());
        }
        let retrieval = self.retriever.retrieve(query, Some(self.chat_k)).await?;
        Ok(retrieval
            .hits
            .into_iter()
            .next()
            .map(|h| h.text)
            .unwrap_or_else(|| NO_MATCH.to_string()))
    }

    /// Answer `query` from retrieved context via the LLM.
    pub async fn answer(&self, query: &str) -> Result<RagAnswer, AssistantError> {
        if query.trim().is_empty() {
            return Err(AssistantError::EmptyQuery);
        }

        if is_greeting(query) {
            return Ok(RagAnswer {
                query: query.to_string(),
                context: String::new(),
                answer: GREETING_INTRO.to_string(),
                intent: Intent::Greeting,
            });
        }

        let retrieval = match self.retriever.retrieve(query, None).await {
            Ok(r) => r,
            Err(RetrievalError::Embedding(e)) => {
                error!(error = %format!("{e:#}"), "query embedding failed");
                return Ok(RagAnswer {
                    query: query.to_string(),
                    context: String::new(),
                    answer: format!("Error: {e:#}"),
                    intent: classify_topic(query),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let texts = retrieval.texts();
        let prompt = build_prompt(query, retrieval.intent, &texts);

        let raw = match self.llm.complete(&prompt, &self.model).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "completion failed");
                e.user_message()
            }
        };

        Ok(RagAnswer {
            query: query.to_string(),
            context: join_context(&texts),
            answer: postprocess(query, &raw),
            intent: retrieval.intent,
        })
    }

    /// Count and truncated previews of every stored chunk.
    pub fn inspect(&self) -> Result<Inspection, AssistantError> {
        let texts = self.store().texts().map_err(AssistantError::Store)?;
        Ok(Inspection {
            count: texts.len(),
            texts: texts
                .iter()
                .map(|t| preview_with_ellipsis(t, self.preview_chars))
                .collect(),
        })
    }
}
