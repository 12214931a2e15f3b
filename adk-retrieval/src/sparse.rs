//! Sparse (lexical) index trait for keyword-style retrieval.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::SearchResult;
use crate::error::{BatchReport, Result};
use crate::value::Metadata;

/// Turns text into index terms. Documents and queries must share one preprocessor.
pub trait Preprocessor: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

impl<F> Preprocessor for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn tokenize(&self, text: &str) -> Vec<String> {
        self(text)
    }
}

/// Lowercases text and splits it on whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPreprocessor;

impl Preprocessor for DefaultPreprocessor {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_lowercase).collect()
    }
}

/// A document submitted to [`SparseIndex::add_batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct SparseDocument {
    pub id: i64,
    pub content: String,
    pub metadata: Metadata,
}

impl SparseDocument {
    pub fn new(id: i64, content: impl Into<String>) -> Self {
        Self { id, content: content.into(), metadata: Metadata::new() }
    }
}

/// A lexical index answering keyword queries with ranked scores.
///
/// Document IDs are shared with the dense [`VectorStore`](crate::VectorStore)
/// so the two rankings can be fused.
///
/// # Example
///
/// ```rust,ignore
/// use adk_retrieval::{Bm25Index, SparseIndex};
///
/// let index = Bm25Index::new();
/// index.add(1, "rust programming language", Metadata::new()).await?;
/// let results = index.search("rust", 5).await?;
/// ```
#[async_trait]
pub trait SparseIndex: Send + Sync {
    /// Index a document. Fails with `AlreadyExists` if `id` is already indexed.
    async fn add(&self, id: i64, content: &str, metadata: Metadata) -> Result<()>;

    /// Replace a document, or add it if absent.
    async fn upsert(&self, id: i64, content: &str, metadata: Metadata) -> Result<()>;

    /// Remove a document. Fails with `NotFound` if `id` is not indexed.
    async fn remove(&self, id: i64) -> Result<()>;

    /// Return up to `top_k` documents ordered by descending score.
    ///
    /// Documents that match no query term are omitted rather than returned
    /// with a zero score.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>>;

    /// Set the scoring parameters of the ranking function.
    async fn set_parameters(&self, k1: f64, b: f64) -> Result<()>;

    /// Replace the preprocessor used for documents and queries.
    async fn set_preprocessor(&self, preprocessor: Arc<dyn Preprocessor>);

    /// Number of indexed documents.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Add documents one by one, reporting and skipping the ones that fail.
    async fn add_batch(&self, documents: Vec<SparseDocument>) -> BatchReport {
        let mut report = BatchReport::default();
        for (position, document) in documents.into_iter().enumerate() {
            match self.add(document.id, &document.content, document.metadata).await {
                Ok(()) => report.succeeded.push(document.id),
                Err(e) => report.record_failure(position, Some(document.id), &e),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preprocessor_lowercases_and_splits() {
        assert_eq!(DefaultPreprocessor.tokenize("Rust  IS\tFast"), vec!["rust", "is", "fast"]);
        assert!(DefaultPreprocessor.tokenize("").is_empty());
    }

    #[test]
    fn closures_are_preprocessors() {
        let pre = |text: &str| text.split(',').map(str::to_string).collect::<Vec<_>>();
        assert_eq!(pre.tokenize("a,b"), vec!["a", "b"]);
    }
}
