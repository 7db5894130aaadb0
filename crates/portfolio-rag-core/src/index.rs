//! Flat (exhaustive) L2 vector index.
//!
//! Vectors are stored contiguously in insertion order; position `i` in the
//! index is the `i`-th vector ever added. The index knows nothing about the
//! text it describes: the application keeps a parallel metadata store
//! aligned by position.
//!
//! Search is brute force over every stored vector, which is adequate for the
//! small, append-only corpora this service targets.
//!
//! # Example
//!
//! ```rust
//! use portfolio_rag_core::index::FlatL2Index;
//!
//! let mut index = FlatL2Index::new(2);
//! index.add(&[0.0, 0.0]).unwrap();
//! index.add(&[3.0, 4.0]).unwrap();
//!
//! let hits = index.search(&[0.0, 1.0], 1).unwrap();
//! assert_eq!(hits[0].position, 0);
//! ```

use anyhow::{bail, Result};

use crate::embedding::l2_distance_squared;
use crate::models::Neighbor;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dims: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    /// Rebuild an index from a flat buffer of `count × dims` floats.
    pub fn from_flat(dims: usize, data: Vec<f32>) -> Result<Self> {
        if dims == 0 {
            bail!("index dimension must be > 0");
        }
        if data.len() % dims != 0 {
            bail!(
                "flat buffer of {} floats is not a multiple of dimension {}",
                data.len(),
                dims
            );
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw contiguous storage, `len() × dims()` floats.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Returns the vector stored at `position`, if any.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dims)?;
        self.data.get(start..start + self.dims)
    }

    /// Append a vector and return its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dims {
            bail!(
                "embedding has {} dimensions, index expects {}",
                vector.len(),
                self.dims
            );
        }
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    /// Drop every vector at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len.saturating_mul(self.dims));
    }

    /// Return up to `k` nearest neighbours by L2 distance, closest first.
    ///
    /// Ties are broken by insertion order. An empty index or `k == 0`
    /// yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dims {
            bail!(
                "query embedding has {} dimensions, index expects {}",
                query.len(),
                self.dims
            );
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(position, v)| (position, l2_distance_squared(query, v)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, d2)| Neighbor {
                position,
                distance: d2.sqrt(),
            })
            .collect())
    }
}
