//! Core data types that flow through ingestion and retrieval.

use serde::Serialize;

/// A stored unit of text together with its embedding.
///
/// `text` is the literal ingested content (a user string or the whole text
/// extracted from an uploaded file). Chunks are never modified once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A raw nearest-neighbour result from the vector index.
///
/// `position` is the insertion index of the matching vector; callers resolve
/// it against the metadata store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// A resolved search hit: chunk text plus its L2 distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub text: String,
    pub distance: f32,
}
