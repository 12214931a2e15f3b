//! In-memory BM25 sparse index.
//!
//! This module provides [`Bm25Index`], a [`SparseIndex`] that maintains
//! Okapi BM25 statistics over the documents added to it:
//!
//! - per-document term frequencies and lengths
//! - a global document-frequency table (as an inverted index of postings)
//! - total document count and average document length
//!
//! All statistics are shared global state touched by every `add`/`remove`, so
//! the whole index sits behind one `tokio::sync::RwLock`: queries run
//! concurrently with each other and exclusively with writers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info};

use crate::document::SearchResult;
use crate::error::{Result, RetrievalError};
use crate::sparse::{DefaultPreprocessor, Preprocessor, SparseIndex};
use crate::value::{Metadata, Value};

/// Default term-frequency saturation parameter.
pub const DEFAULT_K1: f64 = 1.2;
/// Default length-normalization parameter.
pub const DEFAULT_B: f64 = 0.75;

/// Point-in-time statistics of a [`Bm25Index`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub total_docs: usize,
    pub avg_doc_length: f64,
    pub vocabulary_size: usize,
}

#[derive(Debug)]
struct IndexedDocument {
    content: String,
    metadata: Metadata,
    term_freqs: HashMap<String, u32>,
    length: usize,
}

impl IndexedDocument {
    fn new(content: String, metadata: Metadata, terms: Vec<String>) -> Self {
        let length = terms.len();
        let mut term_freqs = HashMap::new();
        for term in terms {
            *term_freqs.entry(term).or_insert(0) += 1;
        }
        Self { content, metadata, term_freqs, length }
    }
}

struct Bm25State {
    documents: HashMap<i64, IndexedDocument>,
    /// term -> IDs of documents containing it; the set size is the term's document frequency.
    postings: HashMap<String, HashSet<i64>>,
    total_length: usize,
    avg_doc_length: f64,
    k1: f64,
    b: f64,
    preprocessor: Arc<dyn Preprocessor>,
    /// Bumped whenever the preprocessor changes, so tokens computed outside the
    /// lock can be checked for staleness.
    generation: u64,
}

impl Bm25State {
    fn new() -> Self {
        Self {
            documents: HashMap::new(),
            postings: HashMap::new(),
            total_length: 0,
            avg_doc_length: 0.0,
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            preprocessor: Arc::new(DefaultPreprocessor),
            generation: 0,
        }
    }

    fn recompute_avg(&mut self) {
        self.avg_doc_length = if self.documents.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.documents.len() as f64
        };
    }

    fn insert(&mut self, id: i64, document: IndexedDocument) {
        for term in document.term_freqs.keys() {
            self.postings.entry(term.clone()).or_default().insert(id);
        }
        self.total_length += document.length;
        self.documents.insert(id, document);
        self.recompute_avg();
    }

    fn remove(&mut self, id: i64) -> Option<IndexedDocument> {
        let document = self.documents.remove(&id)?;
        for term in document.term_freqs.keys() {
            if let Some(ids) = self.postings.get_mut(term) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.total_length -= document.length;
        self.recompute_avg();
        Some(document)
    }

    fn doc_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, HashSet::len)
    }

    /// `ln(1 + (N - df + 0.5) / (df + 0.5))`, always positive.
    fn idf(&self, term: &str) -> f64 {
        let n = self.documents.len() as f64;
        let df = self.doc_frequency(term) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn term_score(&self, idf: f64, tf: f64, doc_length: usize) -> f64 {
        let relative_length =
            if self.avg_doc_length > 0.0 { doc_length as f64 / self.avg_doc_length } else { 0.0 };
        idf * (tf * (self.k1 + 1.0))
            / (tf + self.k1 * (1.0 - self.b + self.b * relative_length))
    }
}

/// An in-memory BM25 index guarded by an index-wide readers-writer lock.
///
/// Re-adding an existing ID with [`add`](SparseIndex::add) fails with
/// `AlreadyExists`; use [`upsert`](SparseIndex::upsert) to replace a document.
///
/// # Example
///
/// ```rust,ignore
/// use adk_retrieval::{Bm25Index, SparseIndex};
///
/// let index = Bm25Index::new();
/// index.add(1, "the quick brown fox", Metadata::new()).await?;
/// index.add(2, "the lazy dog", Metadata::new()).await?;
/// let hits = index.search("quick fox", 10).await?;
/// assert_eq!(hits[0].id, 1);
/// ```
pub struct Bm25Index {
    state: RwLock<Bm25State>,
    span: Span,
}

impl std::fmt::Debug for Bm25Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25Index").finish_non_exhaustive()
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Bm25Index {
    /// Create an empty index with `k1 = 1.2`, `b = 0.75`, and the default preprocessor.
    pub fn new() -> Self {
        Self { state: RwLock::new(Bm25State::new()), span: tracing::info_span!("bm25_index") }
    }

    /// Create an empty index with custom parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidArgument`] if the parameters are out of range.
    pub fn with_parameters(k1: f64, b: f64) -> Result<Self> {
        validate_parameters(k1, b)?;
        let mut state = Bm25State::new();
        state.k1 = k1;
        state.b = b;
        Ok(Self { state: RwLock::new(state), span: tracing::info_span!("bm25_index") })
    }

    /// Emit this index's events under `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Add a document, checking `cancel` before tokenizing and before committing.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::Cancelled`] if `cancel` fired before the commit
    /// - [`RetrievalError::AlreadyExists`] if `id` is already indexed
    pub async fn add_with(
        &self,
        id: i64,
        content: &str,
        metadata: Metadata,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.insert_document(id, content, metadata, false, cancel)
            .instrument(self.span.clone())
            .await
    }

    /// Search, checking `cancel` before tokenizing and before ranking.
    pub async fn search_with(
        &self,
        query: &str,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        self.rank(query, top_k, cancel).instrument(self.span.clone()).await
    }

    /// Snapshot of the index statistics.
    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        IndexStats {
            total_docs: state.documents.len(),
            avg_doc_length: state.avg_doc_length,
            vocabulary_size: state.postings.len(),
        }
    }

    /// Number of indexed documents containing `term` (an already preprocessed term).
    pub async fn doc_frequency(&self, term: &str) -> usize {
        self.state.read().await.doc_frequency(term)
    }

    /// Inverse document frequency of `term` (an already preprocessed term).
    pub async fn idf(&self, term: &str) -> f64 {
        self.state.read().await.idf(term)
    }

    pub async fn contains(&self, id: i64) -> bool {
        self.state.read().await.documents.contains_key(&id)
    }

    /// Current `(k1, b)`.
    pub async fn parameters(&self) -> (f64, f64) {
        let state = self.state.read().await;
        (state.k1, state.b)
    }

    async fn rank(
        &self,
        query: &str,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        check_cancelled(cancel, "bm25 search")?;
        let state = self.state.read().await;
        if state.documents.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let terms: Vec<String> = state
            .preprocessor
            .tokenize(query)
            .into_iter()
            .filter(|term| seen.insert(term.clone()))
            .collect();
        check_cancelled(cancel, "bm25 search")?;

        let mut scores: HashMap<i64, f64> = HashMap::new();
        for term in &terms {
            let Some(ids) = state.postings.get(term) else {
                continue;
            };
            let idf = state.idf(term);
            for id in ids {
                let Some(document) = state.documents.get(id) else {
                    continue;
                };
                let tf = document.term_freqs.get(term).copied().unwrap_or(0) as f64;
                *scores.entry(*id).or_insert(0.0) += state.term_score(idf, tf, document.length);
            }
        }
        check_cancelled(cancel, "bm25 search")?;

        let mut ranked: Vec<(i64, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(top_k);

        let results: Vec<SearchResult> = ranked
            .into_iter()
            .filter_map(|(id, score)| {
                let document = state.documents.get(&id)?;
                let mut fields = document.metadata.clone();
                fields.insert("content".to_string(), Value::Str(document.content.clone()));
                Some(SearchResult { id, score, fields })
            })
            .collect();

        debug!(terms = terms.len(), result_count = results.len(), "bm25 search completed");
        Ok(results)
    }

    async fn insert_document(
        &self,
        id: i64,
        content: &str,
        metadata: Metadata,
        replace: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(cancel, "bm25 add")?;

        // Tokenize outside the write lock; redo it only if the preprocessor changed meanwhile.
        let (preprocessor, generation) = {
            let state = self.state.read().await;
            (state.preprocessor.clone(), state.generation)
        };
        let mut terms = preprocessor.tokenize(content);
        check_cancelled(cancel, "bm25 add")?;

        let mut state = self.state.write().await;
        if state.generation != generation {
            terms = state.preprocessor.tokenize(content);
        }
        if state.documents.contains_key(&id) {
            if !replace {
                return Err(RetrievalError::AlreadyExists {
                    kind: "document",
                    name: id.to_string(),
                });
            }
            state.remove(id);
        }

        let term_count = terms.len();
        state.insert(id, IndexedDocument::new(content.to_string(), metadata, terms));
        debug!(
            id,
            terms = term_count,
            total_docs = state.documents.len(),
            avg_doc_length = state.avg_doc_length,
            "indexed document"
        );
        Ok(())
    }
}

fn validate_parameters(k1: f64, b: f64) -> Result<()> {
    if !k1.is_finite() || k1 < 0.0 {
        return Err(RetrievalError::InvalidArgument(format!(
            "k1 must be a non-negative finite number, got {k1}"
        )));
    }
    if !(0.0..=1.0).contains(&b) {
        return Err(RetrievalError::InvalidArgument(format!("b must be within [0, 1], got {b}")));
    }
    Ok(())
}

fn check_cancelled(cancel: &CancellationToken, operation: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RetrievalError::Cancelled(operation.to_string()));
    }
    Ok(())
}

#[async_trait]
impl SparseIndex for Bm25Index {
    async fn add(&self, id: i64, content: &str, metadata: Metadata) -> Result<()> {
        self.add_with(id, content, metadata, &CancellationToken::new()).await
    }

    async fn upsert(&self, id: i64, content: &str, metadata: Metadata) -> Result<()> {
        self.insert_document(id, content, metadata, true, &CancellationToken::new())
            .instrument(self.span.clone())
            .await
    }

    async fn remove(&self, id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if state.remove(id).is_none() {
            return Err(RetrievalError::document_not_found(id));
        }
        self.span.in_scope(|| {
            debug!(id, total_docs = state.documents.len(), "removed document");
        });
        Ok(())
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        self.search_with(query, top_k, &CancellationToken::new()).await
    }

    async fn set_parameters(&self, k1: f64, b: f64) -> Result<()> {
        validate_parameters(k1, b)?;
        let mut state = self.state.write().await;
        state.k1 = k1;
        state.b = b;
        self.span.in_scope(|| info!(k1, b, "updated bm25 parameters"));
        Ok(())
    }

    async fn set_preprocessor(&self, preprocessor: Arc<dyn Preprocessor>) {
        let mut state = self.state.write().await;
        let documents: Vec<(i64, IndexedDocument)> = state.documents.drain().collect();
        state.postings.clear();
        state.total_length = 0;
        for (id, document) in documents {
            let terms = preprocessor.tokenize(&document.content);
            state.insert(id, IndexedDocument::new(document.content, document.metadata, terms));
        }
        state.recompute_avg();
        state.preprocessor = preprocessor;
        state.generation += 1;
        self.span.in_scope(|| {
            info!(reindexed = state.documents.len(), "replaced preprocessor");
        });
    }

    async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }
}
