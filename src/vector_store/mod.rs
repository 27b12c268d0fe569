#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use crate::{AskdocError, Result};

/// Flat exact-search structure over the stored vectors.
///
/// Every query scans all rows and computes squared Euclidean distance.
/// Document-scale chunk counts stay small enough that a linear scan beats
/// any partitioning structure, and exactness comes for free.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Row indices of the `k` nearest vectors, ascending by distance.
    /// Ties keep insertion order (the sort is stable).
    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(row, vector)| (row, squared_l2(query, vector)))
            .collect();

        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);
        hits
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// A retrieved chunk paired with its squared Euclidean distance to the
/// query. Lower distance means more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub text: String,
    pub distance: f32,
}

/// Per-document vector index holding chunk texts and their embeddings.
///
/// Persisted as two sibling artifacts named after the document ID:
/// `{id}.index` (dimension + vector rows) and `{id}.chunks` (ordered chunk
/// texts). Row order in the index artifact is the join key against the
/// chunks artifact; the two always have equal length.
pub struct VectorStore {
    document_id: String,
    data_dir: PathBuf,
    dimension: usize,
    index: Option<FlatIndex>,
    chunks: Vec<String>,
}

impl VectorStore {
    #[inline]
    pub fn new<P: AsRef<Path>>(document_id: &str, data_dir: P, dimension: usize) -> Self {
        Self {
            document_id: document_id.to_string(),
            data_dir: data_dir.as_ref().to_path_buf(),
            dimension,
            index: None,
            chunks: Vec::new(),
        }
    }

    /// Build the index from parallel chunk and embedding sequences.
    ///
    /// The sequences must be non-empty, equal in length, and every
    /// embedding must match the configured dimension. The index is
    /// create-once: there is no incremental insertion afterwards.
    #[inline]
    pub fn create_index(&mut self, chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.is_empty() || embeddings.is_empty() {
            return Err(AskdocError::InvalidInput(
                "Chunks and embeddings cannot be empty".to_string(),
            ));
        }

        if chunks.len() != embeddings.len() {
            return Err(AskdocError::InvalidInput(format!(
                "Chunk count ({}) does not match embedding count ({})",
                chunks.len(),
                embeddings.len()
            )));
        }

        for (row, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != self.dimension {
                return Err(AskdocError::InvalidInput(format!(
                    "Embedding {} has dimension {}, expected {}",
                    row,
                    embedding.len(),
                    self.dimension
                )));
            }
        }

        debug!(
            "Building flat index for document {} with {} vectors of dimension {}",
            self.document_id,
            embeddings.len(),
            self.dimension
        );

        self.chunks = chunks;
        self.index = Some(FlatIndex {
            dimension: self.dimension,
            vectors: embeddings,
        });

        Ok(())
    }

    /// Return the `k` most similar chunks to the query embedding, closest
    /// first. Returns everything when the index holds fewer than `k` rows.
    #[inline]
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let index = self.index.as_ref().ok_or(AskdocError::NotInitialized)?;

        if query_embedding.len() != index.dimension {
            return Err(AskdocError::InvalidInput(format!(
                "Query embedding has dimension {}, expected {}",
                query_embedding.len(),
                index.dimension
            )));
        }

        let results = index
            .search(query_embedding, k)
            .into_iter()
            // Rows beyond the chunk sequence cannot appear while the
            // creation invariant holds; skip rather than fault if one does.
            .filter_map(|(row, distance)| {
                self.chunks.get(row).map(|text| SearchResult {
                    text: text.clone(),
                    distance,
                })
            })
            .collect();

        Ok(results)
    }

    /// Persist the index and chunk artifacts.
    ///
    /// Each artifact is written to a temporary sibling and renamed into
    /// place, so a reader only ever observes a complete file. The chunks
    /// artifact is written before the index artifact: `exists` checks the
    /// index artifact alone, so it must be the last piece to appear.
    #[inline]
    pub fn save(&self) -> Result<()> {
        let index = self.index.as_ref().ok_or(AskdocError::NotInitialized)?;

        write_artifact(&self.chunks_path(), &self.chunks)?;
        write_artifact(&self.index_path(), index)?;

        info!(
            "Saved document {} ({} vectors) to {}",
            self.document_id,
            index.vectors.len(),
            self.data_dir.display()
        );

        Ok(())
    }

    /// Restore a previously saved index.
    ///
    /// Fails with `NotFound` when either artifact is missing and rejects
    /// artifact pairs whose vector and chunk counts disagree rather than
    /// truncating to the shorter side.
    #[inline]
    pub fn load(&mut self) -> Result<()> {
        let index_path = self.index_path();
        let chunks_path = self.chunks_path();

        if !index_path.exists() || !chunks_path.exists() {
            return Err(AskdocError::NotFound(self.document_id.clone()));
        }

        let index: FlatIndex = read_artifact(&index_path)?;
        let chunks: Vec<String> = read_artifact(&chunks_path)?;

        if index.vectors.len() != chunks.len() {
            return Err(AskdocError::InvalidInput(format!(
                "Artifact mismatch for document {}: {} vectors but {} chunks",
                self.document_id,
                index.vectors.len(),
                chunks.len()
            )));
        }

        if let Some(row) = index.vectors.iter().position(|v| v.len() != index.dimension) {
            return Err(AskdocError::InvalidInput(format!(
                "Corrupt index artifact for document {}: row {} has dimension {}, expected {}",
                self.document_id,
                row,
                index.vectors[row].len(),
                index.dimension
            )));
        }

        debug!(
            "Loaded document {} with {} vectors of dimension {}",
            self.document_id,
            index.vectors.len(),
            index.dimension
        );

        self.dimension = index.dimension;
        self.chunks = chunks;
        self.index = Some(index);

        Ok(())
    }

    /// Whether a saved index exists for the document.
    ///
    /// Presence is defined by the index artifact alone. `save` writes the
    /// chunks artifact first, so a true result implies both are on disk
    /// barring external interference.
    #[inline]
    pub fn exists<P: AsRef<Path>>(document_id: &str, data_dir: P) -> bool {
        data_dir
            .as_ref()
            .join(format!("{document_id}.index"))
            .exists()
    }

    /// Remove both artifacts. The index artifact goes first so `exists`
    /// reports false before the chunks artifact disappears.
    #[inline]
    pub fn delete<P: AsRef<Path>>(document_id: &str, data_dir: P) -> Result<()> {
        let data_dir = data_dir.as_ref();
        let index_path = data_dir.join(format!("{document_id}.index"));
        let chunks_path = data_dir.join(format!("{document_id}.chunks"));

        if !index_path.exists() {
            return Err(AskdocError::NotFound(document_id.to_string()));
        }

        fs::remove_file(&index_path)?;
        if chunks_path.exists() {
            fs::remove_file(&chunks_path)?;
        }

        info!("Deleted document {}", document_id);
        Ok(())
    }

    #[inline]
    pub fn vector_count(&self) -> usize {
        self.index.as_ref().map_or(0, |index| index.vectors.len())
    }

    #[inline]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    fn index_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.index", self.document_id))
    }

    fn chunks_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.chunks", self.document_id))
    }
}

fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp_path = path.with_extension(
        path.extension()
            .map_or_else(|| "tmp".to_string(), |ext| format!("{}.tmp", ext.to_string_lossy())),
    );

    let file = fs::File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .map_err(|e| AskdocError::InvalidInput(format!("Failed to serialize artifact: {e}")))?;
    std::io::Write::flush(&mut writer)?;

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn read_artifact<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| {
        AskdocError::InvalidInput(format!(
            "Failed to parse artifact {}: {e}",
            path.display()
        ))
    })
}

/// Registry of per-document mutexes serializing `save` and `load` for the
/// same document ID. Owned by whoever drives the engine and passed down,
/// so tests construct isolated instances and the exclusion discipline
/// stays in one place. Different documents never contend.
#[derive(Debug, Clone, Default)]
pub struct DocumentLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DocumentLocks {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding artifact access for `document_id`, created on
    /// first use. Callers hold its guard across the save or load.
    #[inline]
    pub fn for_document(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            map.entry(document_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
