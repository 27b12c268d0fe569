#[cfg(test)]
mod tests;

use itertools::Itertools;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;
use tracing::debug;

use crate::vector_store::{DocumentLocks, SearchResult, VectorStore};
use crate::{AskdocError, Result};

/// Builds the answer context for a question by searching a document's
/// vector store and joining the best-matching chunks.
pub struct Retriever {
    data_dir: PathBuf,
    dimension: usize,
    locks: DocumentLocks,
}

impl Retriever {
    #[inline]
    pub fn new<P: AsRef<Path>>(data_dir: P, dimension: usize, locks: DocumentLocks) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            dimension,
            locks,
        }
    }

    #[inline]
    pub fn document_exists(&self, document_id: &str) -> bool {
        VectorStore::exists(document_id, &self.data_dir)
    }

    /// The `k` nearest chunks for the query embedding, closest first.
    #[inline]
    pub fn search(
        &self,
        document_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        if !VectorStore::exists(document_id, &self.data_dir) {
            return Err(AskdocError::NotFound(document_id.to_string()));
        }

        let mut store = VectorStore::new(document_id, &self.data_dir, self.dimension);
        {
            let lock = self.locks.for_document(document_id);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            store.load()?;
        }

        store.search(query_embedding, k)
    }

    /// Join the `k` nearest chunks into the context string handed to the
    /// answer generator: ranked order, closest first, separated by blank
    /// lines. Downstream prompting depends on this exact shape.
    #[inline]
    pub fn build_context(
        &self,
        document_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<String> {
        let results = self.search(document_id, query_embedding, k)?;

        debug!(
            "Built context for document {} from {} chunks",
            document_id,
            results.len()
        );

        Ok(results.iter().map(|result| result.text.as_str()).join("\n\n"))
    }
}
