//! Persisted vector store: a flat L2 index plus aligned chunk texts.
//!
//! The store is two physical structures kept in lockstep by insertion
//! order: the vector index (position `i` is the `i`-th embedding) and the
//! metadata store (position `i` is the `i`-th chunk text). Both live in
//! memory and are mirrored to two files on disk.
//!
//! # Concurrency
//!
//! - Appends are serialized by a writer mutex.
//! - An append first writes the complete new snapshot to disk, then takes
//!   the state write lock just long enough to push the chunk onto both
//!   structures. A failed write leaves memory untouched.
//! - Searches take the state read lock and therefore observe either the
//!   pre- or the post-append state, never a half-applied one.
//!
//! # On-disk layout
//!
//! | File | Format |
//! |------|--------|
//! | index | `FOLIOIDX` magic, `u32` version, `u32` dims, `u64` count, then `count × dims` little-endian `f32` |
//! | metadata | JSON array of chunk texts |
//!
//! Each file is written to a `.tmp` sibling and renamed into place. If the
//! process dies between the two renames the files disagree by one entry;
//! [`VectorStore::open`] repairs this by truncating both to the shorter
//! length, losing at most the last append.

use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use portfolio_rag_core::embedding::{blob_to_vec, vec_to_blob};
use portfolio_rag_core::index::FlatL2Index;
use portfolio_rag_core::models::Hit;

use crate::config::StoreConfig;

const INDEX_MAGIC: &[u8; 8] = b"FOLIOIDX";
const INDEX_VERSION: u32 = 1;
const INDEX_HEADER_LEN: usize = 8 + 4 + 4 + 8;

/// In-memory state guarded as a single unit.
#[derive(Debug, Clone, PartialEq)]
struct StoreState {
    index: FlatL2Index,
    texts: Vec<String>,
}

/// The process-wide vector store.
///
/// Construct once at startup with [`VectorStore::open`] (or
/// [`VectorStore::in_memory`] in tests) and share it behind an `Arc`.
pub struct VectorStore {
    index_path: Option<PathBuf>,
    metadata_path: Option<PathBuf>,
    writer: Mutex<()>,
    state: RwLock<StoreState>,
}

impl VectorStore {
    /// A store that is never persisted.
    pub fn in_memory(dims: usize) -> Self {
        Self {
            index_path: None,
            metadata_path: None,
            writer: Mutex::new(()),
            state: RwLock::new(StoreState {
                index: FlatL2Index::new(dims),
                texts: Vec::new(),
            }),
        }
    }

    /// Load the store from `config`'s paths, or start empty if neither
    /// file exists yet.
    pub fn open(config: &StoreConfig, dims: usize) -> Result<Self> {
        let state = load_state(&config.index_path, &config.metadata_path, dims)?;
        info!(
            chunks = state.texts.len(),
            index = %config.index_path.display(),
            "vector store loaded"
        );
        Ok(Self {
            index_path: Some(config.index_path.clone()),
            metadata_path: Some(config.metadata_path.clone()),
            writer: Mutex::new(()),
            state: RwLock::new(state),
        })
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| anyhow!("vector store lock poisoned"))
    }

    pub fn dims(&self) -> Result<usize> {
        Ok(self.read_state()?.index.dims())
    }

    /// Number of stored chunks. Index and metadata always agree.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_state()?.texts.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All chunk texts in insertion order.
    pub fn texts(&self) -> Result<Vec<String>> {
        Ok(self.read_state()?.texts.clone())
    }

    /// The last `n` chunk texts in insertion order.
    pub fn recent(&self, n: usize) -> Result<Vec<String>> {
        let state = self.read_state()?;
        let start = state.texts.len().saturating_sub(n);
        Ok(state.texts[start..].to_vec())
    }

    /// Append one chunk to both structures and persist them.
    ///
    /// Returns the new chunk's position. On error neither memory nor disk
    /// has changed.
    pub fn append(&self, text: &str, embedding: &[f32]) -> Result<usize> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("vector store writer lock poisoned"))?;

        // Build the next snapshot from the current one; readers keep
        // working against the published state meanwhile.
        let mut next = (*self.read_state()?).clone();
        let position = next.index.add(embedding)?;
        next.texts.push(text.to_string());

        self.persist_state(&next)?;

        let mut state = self
            .state
            .write()
            .map_err(|_| anyhow!("vector store lock poisoned"))?;
        *state = next;

        debug!(position, chars = text.len(), "chunk appended");
        Ok(position)
    }

    /// Up to `k` nearest chunks by L2 distance, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        let state = self.read_state()?;
        let neighbors = state.index.search(query, k)?;
        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                state.texts.get(n.position).map(|text| Hit {
                    text: text.clone(),
                    distance: n.distance,
                })
            })
            .collect())
    }

    /// Write the current snapshot of both structures to disk.
    pub fn persist(&self) -> Result<()> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("vector store writer lock poisoned"))?;
        let state = self.read_state()?;
        self.persist_state(&state)
    }

    fn persist_state(&self, state: &StoreState) -> Result<()> {
        let (Some(index_path), Some(metadata_path)) = (&self.index_path, &self.metadata_path)
        else {
            return Ok(());
        };

        let index_bytes = encode_index(&state.index);
        let metadata_bytes =
            serde_json::to_vec(&state.texts).context("Failed to encode chunk metadata")?;

        let index_tmp = write_tmp(index_path, &index_bytes)?;
        let metadata_tmp = match write_tmp(metadata_path, &metadata_bytes) {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&index_tmp);
                return Err(e);
            }
        };

        fs::rename(&index_tmp, index_path)
            .with_context(|| format!("Failed to replace {}", index_path.display()))?;
        fs::rename(&metadata_tmp, metadata_path)
            .with_context(|| format!("Failed to replace {}", metadata_path.display()))?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_tmp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let tmp = tmp_path(path);
    let mut file =
        fs::File::create(&tmp).with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    Ok(tmp)
}

fn encode_index(index: &FlatL2Index) -> Vec<u8> {
    let mut out = Vec::with_capacity(INDEX_HEADER_LEN + index.as_flat().len() * 4);
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    out.extend_from_slice(&(index.dims() as u32).to_le_bytes());
    out.extend_from_slice(&(index.len() as u64).to_le_bytes());
    out.extend_from_slice(&vec_to_blob(index.as_flat()));
    out
}

fn decode_index(bytes: &[u8]) -> Result<FlatL2Index> {
    if bytes.len() < INDEX_HEADER_LEN || &bytes[..8] != INDEX_MAGIC {
        bail!("not a vector index file (bad header)");
    }
    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if version != INDEX_VERSION {
        bail!("unsupported vector index version {}", version);
    }
    let dims = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[16..24]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    let body = &bytes[INDEX_HEADER_LEN..];
    let expected = count
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| anyhow!("vector index header overflows"))?;
    if body.len() != expected {
        bail!(
            "vector index body is {} bytes, header promises {}",
            body.len(),
            expected
        );
    }
    FlatL2Index::from_flat(dims, blob_to_vec(body))
}

fn load_state(index_path: &Path, metadata_path: &Path, dims: usize) -> Result<StoreState> {
    let index = if index_path.exists() {
        let bytes = fs::read(index_path)
            .with_context(|| format!("Failed to read {}", index_path.display()))?;
        decode_index(&bytes).with_context(|| format!("Corrupt index {}", index_path.display()))?
    } else {
        FlatL2Index::new(dims)
    };

    let texts: Vec<String> = if metadata_path.exists() {
        let bytes = fs::read(metadata_path)
            .with_context(|| format!("Failed to read {}", metadata_path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt metadata {}", metadata_path.display()))?
    } else {
        Vec::new()
    };

    if index.dims() != dims {
        bail!(
            "index {} holds {}-dimensional vectors but embedding.dims is {}",
            index_path.display(),
            index.dims(),
            dims
        );
    }

    let mut state = StoreState { index, texts };
    let (n_index, n_texts) = (state.index.len(), state.texts.len());
    if n_index != n_texts {
        let keep = n_index.min(n_texts);
        warn!(
            index = n_index,
            metadata = n_texts,
            keep,
            "vector index and metadata disagree; truncating to the shorter"
        );
        state.index.truncate(keep);
        state.texts.truncate(keep);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_config(dir: &TempDir) -> StoreConfig {
        StoreConfig {
            index_path: dir.path().join("data/vector.index"),
            metadata_path: dir.path().join("data/vector.meta.json"),
        }
    }

    fn unit(dims: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dims];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_empty_store_search() {
        let store = VectorStore::in_memory(4);
        assert!(store.search(&unit(4, 0), 5).unwrap().is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_append_keeps_index_and_metadata_aligned() {
        let store = VectorStore::in_memory(4);
        for i in 0..4 {
            assert_eq!(store.append(&format!("chunk {i}"), &unit(4, i)).unwrap(), i);
        }
        let state = store.read_state().unwrap();
        assert_eq!(state.index.len(), 4);
        assert_eq!(state.texts.len(), 4);
        drop(state);

        let hits = store.search(&unit(4, 2), 1).unwrap();
        assert_eq!(hits[0].text, "chunk 2");
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_search_ordering_and_k() {
        let store = VectorStore::in_memory(2);
        store.append("far", &[10.0, 0.0]).unwrap();
        store.append("near", &[1.0, 0.0]).unwrap();
        store.append("mid", &[4.0, 0.0]).unwrap();

        let hits = store.search(&[0.0, 0.0], 2).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid"]);

        assert_eq!(store.search(&[0.0, 0.0], 50).unwrap().len(), 3);
    }

    #[test]
    fn test_wrong_dimension_append_leaves_store_unchanged() {
        let store = VectorStore::in_memory(3);
        assert!(store.append("bad", &[1.0]).is_err());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_recent() {
        let store = VectorStore::in_memory(2);
        for i in 0..7 {
            store.append(&format!("t{i}"), &[i as f32, 0.0]).unwrap();
        }
        assert_eq!(store.recent(3).unwrap(), vec!["t4", "t5", "t6"]);
        assert_eq!(store.recent(100).unwrap().len(), 7);
    }

    #[test]
    fn test_persist_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cfg = store_config(&dir);
        {
            let store = VectorStore::open(&cfg, 3).unwrap();
            store.append("alpha", &[1.0, 0.0, 0.0]).unwrap();
            store.append("beta ✓ unicode", &[0.0, 1.0, 0.5]).unwrap();
        }
        assert!(cfg.index_path.exists());
        assert!(cfg.metadata_path.exists());

        let reopened = VectorStore::open(&cfg, 3).unwrap();
        assert_eq!(reopened.texts().unwrap(), vec!["alpha", "beta ✓ unicode"]);
        let hits = reopened.search(&[0.0, 1.0, 0.5], 1).unwrap();
        assert_eq!(hits[0].text, "beta ✓ unicode");
    }

    #[test]
    fn test_explicit_persist_is_observationally_equal() {
        let dir = TempDir::new().unwrap();
        let cfg = store_config(&dir);
        let store = VectorStore::open(&cfg, 2).unwrap();
        store.append("a", &[0.0, 1.0]).unwrap();
        store.append("b", &[1.0, 0.0]).unwrap();
        store.persist().unwrap();

        let reopened = VectorStore::open(&cfg, 2).unwrap();
        assert_eq!(
            *store.read_state().unwrap(),
            *reopened.read_state().unwrap()
        );
    }

    #[test]
    fn test_open_rejects_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let cfg = store_config(&dir);
        VectorStore::open(&cfg, 2)
            .unwrap()
            .append("a", &[1.0, 2.0])
            .unwrap();
        assert!(VectorStore::open(&cfg, 384).is_err());
    }

    #[test]
    fn test_open_repairs_skew_from_interrupted_persist() {
        let dir = TempDir::new().unwrap();
        let cfg = store_config(&dir);
        let store = VectorStore::open(&cfg, 2).unwrap();
        store.append("a", &[1.0, 0.0]).unwrap();
        store.append("b", &[0.0, 1.0]).unwrap();

        // Simulate a crash after the index rename but before the metadata rename.
        fs::write(&cfg.metadata_path, serde_json::to_vec(&vec!["a"]).unwrap()).unwrap();

        let reopened = VectorStore::open(&cfg, 2).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
        assert_eq!(reopened.read_state().unwrap().index.len(), 1);
        assert_eq!(reopened.texts().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cfg = store_config(&dir);
        fs::create_dir_all(cfg.index_path.parent().unwrap()).unwrap();
        fs::write(&cfg.index_path, b"garbage").unwrap();
        assert!(VectorStore::open(&cfg, 2).is_err());
    }

    #[test]
    fn test_failed_persist_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        // A regular file where the metadata directory should be.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let cfg = StoreConfig {
            index_path: dir.path().join("vector.index"),
            metadata_path: blocker.join("meta.json"),
        };
        let store = VectorStore::open(&cfg, 2).unwrap();

        assert!(store.append("a", &[1.0, 0.0]).is_err());
        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(store.read_state().unwrap().index.len(), 0);
        assert!(!cfg.index_path.exists());
    }

    #[test]
    fn test_concurrent_appends_stay_aligned() {
        let store = Arc::new(VectorStore::in_memory(2));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let text = format!("t{t}-{i}");
                        store.append(&text, &[t as f32, i as f32]).unwrap();
                        // Every reader sees an aligned snapshot.
                        let state = store.read_state().unwrap();
                        assert_eq!(state.index.len(), state.texts.len());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len().unwrap(), 200);
        // Each text still sits next to its own vector.
        let state = store.read_state().unwrap();
        for (position, text) in state.texts.iter().enumerate() {
            let (t, i) = text[1..].split_once('-').unwrap();
            let v = state.index.vector(position).unwrap();
            assert_eq!(v, &[t.parse::<f32>().unwrap(), i.parse::<f32>().unwrap()]);
        }
    }
}
