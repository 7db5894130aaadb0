//! Query-aware retrieval over the vector store.
//!
//! 1. Classify the query's topic (greetings do not change breadth).
//! 2. Embed the query.
//! 3. Search the store for `k` neighbours: the caller's `k` if given,
//!    otherwise [`RetrievalParams::k_for`] the topic.
//! 4. Apply the topic's secondary filter (project markers, fail-open).

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use portfolio_rag_core::embedding::Embedder;
use portfolio_rag_core::intent::{classify_topic, Intent};
use portfolio_rag_core::models::Hit;
use portfolio_rag_core::retrieval::{refine, RetrievalParams};

use crate::store::VectorStore;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding service failed for the query.
    #[error("failed to embed query: {0:#}")]
    Embedding(anyhow::Error),
    /// The vector store rejected the search.
    #[error("vector search failed: {0:#}")]
    Store(anyhow::Error),
}

/// Outcome of one retrieval: the topic, the breadth asked for, and the
/// surviving hits (closest first).
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub intent: Intent,
    pub k: usize,
    pub hits: Vec<Hit>,
}

impl Retrieval {
    pub fn texts(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.text.clone()).collect()
    }
}

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>, params: RetrievalParams) -> Self {
        Self {
            embedder,
            store,
            params,
        }
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Fail if the embedder produces vectors the store cannot hold.
    ///
    /// An embedder reporting zero dimensions (the disabled provider) is
    /// accepted; it never produces vectors.
    pub fn check_dims(&self) -> anyhow::Result<()> {
        let embedder_dims = self.embedder.dims();
        let store_dims = self.store.dims()?;
        if embedder_dims != 0 && embedder_dims != store_dims {
            anyhow::bail!(
                "embedding model {} produces {}-dimensional vectors but the store holds {}",
                self.embedder.model_name(),
                embedder_dims,
                store_dims
            );
        }
        Ok(())
    }

    /// Retrieve context chunks for `query`.
    ///
    /// `k` overrides the intent-derived breadth (the lightweight chat
    /// endpoint asks for a single neighbour).
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Result<Retrieval, RetrievalError> {
        let intent = classify_topic(query);
        let k = k.unwrap_or_else(|| self.params.k_for(intent));

        let query_vec = self
            .embedder
            .embed(query)
            .await
            .map_err(RetrievalError::Embedding)?;

        let raw = self
            .store
            .search(&query_vec, k)
            .map_err(RetrievalError::Store)?;
        let raw_len = raw.len();
        let hits = refine(intent, raw);

        debug!(%intent, k, raw = raw_len, kept = hits.len(), "retrieved context");
        Ok(Retrieval { intent, k, hits })
    }
}
