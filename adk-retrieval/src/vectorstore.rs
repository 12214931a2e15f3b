//! Vector store trait for storing and searching vector embeddings.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::document::SearchResult;
use crate::error::{BatchReport, Result, RetrievalError};
use crate::reranker::Reranker;
use crate::schema::{CollectionSchema, IndexParams, MetricType};
use crate::value::{Record, Value};

/// Outcome of [`VectorStore::insert`]: primary keys of stored records and the
/// records that were rejected.
pub type InsertReport = BatchReport;

/// A dense search over one or more named vector fields.
///
/// # Example
///
/// ```rust,ignore
/// let request = SearchRequest::new(5)
///     .with_vector("embedding", query_embedding)
///     .with_metric(MetricType::L2)
///     .with_param("ef", 64i64);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Query vector per field name.
    pub vectors: Vec<(String, Vec<f32>)>,
    pub top_k: usize,
    pub metric: MetricType,
    /// Backend-specific search parameters (e.g. `nprobe`, `ef`).
    pub params: BTreeMap<String, Value>,
    /// Checked between the coarse steps of the search.
    pub cancellation: Option<CancellationToken>,
}

impl SearchRequest {
    pub fn new(top_k: usize) -> Self {
        Self { top_k, ..Self::default() }
    }

    pub fn with_vector(mut self, field: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.push((field.into(), vector));
        self
    }

    pub fn with_metric(mut self, metric: MetricType) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fail with [`RetrievalError::Cancelled`] if the request's token has fired.
    pub fn check_cancelled(&self, operation: &str) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => {
                Err(RetrievalError::Cancelled(operation.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// A storage backend for records with dense vector similarity search.
///
/// Implementations manage named, schema-bound collections. Results use
/// "smaller is closer" scores for every metric (see [`MetricType`]), except
/// when a reranker fuses rankings in [`hybrid_search`](Self::hybrid_search),
/// where the fused score is larger-is-better.
///
/// Operations on a missing collection fail with
/// [`RetrievalError::NotFound`]; creating an existing one fails with
/// [`RetrievalError::AlreadyExists`].
///
/// # Example
///
/// ```rust,ignore
/// use adk_retrieval::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", schema).await?;
/// store.insert("docs", records).await?;
/// let results = store.search("docs", &SearchRequest::new(5).with_vector("embedding", q)).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Identifier of the backend, as registered in a
    /// [`BackendRegistry`](crate::BackendRegistry).
    fn backend(&self) -> &str;

    async fn connect(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn has_collection(&self, name: &str) -> Result<bool>;

    /// Create a collection. The schema is validated and fixed for the collection's lifetime.
    async fn create_collection(&self, name: &str, schema: CollectionSchema) -> Result<()>;

    /// Drop a collection and all its records.
    async fn drop_collection(&self, name: &str) -> Result<()>;

    /// Append records to a collection.
    ///
    /// Each record is validated on its own; malformed records and duplicate
    /// primary keys are reported in the returned report and skipped.
    async fn insert(&self, collection: &str, records: Vec<Record>) -> Result<InsertReport>;

    /// Delete records by primary key and return how many were removed.
    ///
    /// Keys that are not stored are ignored.
    async fn delete(&self, collection: &str, ids: &[i64]) -> Result<usize>;

    /// Durability barrier. May be a no-op for non-durable backends.
    async fn flush(&self, collection: &str) -> Result<()>;

    /// Optimization hint for `field`. May be a no-op.
    async fn create_index(&self, collection: &str, field: &str, params: &IndexParams)
    -> Result<()>;

    /// Readiness hint. May be a no-op.
    async fn load_collection(&self, collection: &str) -> Result<()>;

    /// Rank records by their closest queried field and return the top `request.top_k`.
    async fn search(&self, collection: &str, request: &SearchRequest)
    -> Result<Vec<SearchResult>>;

    /// Rank records carrying every queried field.
    ///
    /// Without a reranker records are scored by mean per-field distance. With
    /// one, each field yields its own ranking and the reranker fuses them.
    async fn hybrid_search(
        &self,
        collection: &str,
        request: &SearchRequest,
        reranker: Option<&dyn Reranker>,
    ) -> Result<Vec<SearchResult>>;

    /// Select the record fields projected into result `fields` for subsequent searches.
    async fn set_column_names(&self, columns: Vec<String>) -> Result<()>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema>;
}
