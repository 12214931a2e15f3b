//! In-memory vector store using exhaustive linear-scan search.
//!
//! This module provides [`InMemoryVectorStore`], the reference
//! [`VectorStore`] backend. Collections live in a `HashMap` protected by a
//! store-wide `tokio::sync::RwLock`: collection lifecycle and inserts take the
//! write lock, searches take the read lock, so a search never observes a
//! partially applied insert. It is suitable for development, testing, and
//! small-scale use cases.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{Instrument, Span, debug, info};

use crate::document::SearchResult;
use crate::error::{Result, RetrievalError};
use crate::reranker::{RankedList, Reranker};
use crate::schema::{CollectionSchema, IndexParams, check_finite, dimension_mismatch};
use crate::value::{Record, Value};
use crate::vectorstore::{InsertReport, SearchRequest, VectorStore};

/// Identifier under which the in-memory backend is registered.
pub const MEMORY_BACKEND: &str = "memory";

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    primary_key: String,
    auto_id: bool,
    /// Keyed by primary key so scans run in a stable order.
    records: BTreeMap<i64, Record>,
    next_id: i64,
    indexes: BTreeMap<String, IndexParams>,
    loaded: bool,
}

impl Collection {
    fn new(schema: CollectionSchema) -> Result<Self> {
        schema.validate()?;
        let (primary_key, auto_id) = schema
            .primary_key()
            .map(|f| (f.name.clone(), f.auto_id))
            .ok_or_else(|| RetrievalError::InvalidArgument("schema has no primary key".into()))?;
        Ok(Self {
            schema,
            primary_key,
            auto_id,
            records: BTreeMap::new(),
            next_id: 1,
            indexes: BTreeMap::new(),
            loaded: false,
        })
    }

    /// Validate a record and resolve its primary key without storing it.
    fn prepare(&mut self, mut record: Record) -> Result<(i64, Record)> {
        self.schema.validate_record(&record)?;

        let id = if self.auto_id {
            if record.get(&self.primary_key).is_some() {
                return Err(RetrievalError::InvalidArgument(format!(
                    "primary key '{}' is auto-assigned and must be omitted",
                    self.primary_key
                )));
            }
            let id = self.next_id;
            self.next_id += 1;
            record.insert(self.primary_key.clone(), id);
            id
        } else {
            match record.get(&self.primary_key) {
                Some(Value::Int(id)) => *id,
                Some(other) => {
                    return Err(RetrievalError::InvalidArgument(format!(
                        "primary key '{}' must be int64, got {}",
                        self.primary_key,
                        other.type_name()
                    )));
                }
                None => {
                    return Err(RetrievalError::InvalidArgument(format!(
                        "record is missing primary key '{}'",
                        self.primary_key
                    )));
                }
            }
        };

        if self.records.contains_key(&id) {
            return Err(RetrievalError::AlreadyExists { kind: "record", name: id.to_string() });
        }
        Ok((id, record))
    }

    /// Check every queried field is a declared vector field of matching dimension.
    fn validate_query(&self, request: &SearchRequest) -> Result<()> {
        if request.vectors.is_empty() {
            return Err(RetrievalError::InvalidArgument("search has no query vectors".into()));
        }
        for (i, (field, vector)) in request.vectors.iter().enumerate() {
            if request.vectors[..i].iter().any(|(other, _)| other == field) {
                return Err(RetrievalError::InvalidArgument(format!(
                    "field '{field}' queried more than once"
                )));
            }
            let schema = self.schema.field(field).filter(|f| f.is_vector()).ok_or_else(|| {
                RetrievalError::InvalidArgument(format!("'{field}' is not a vector field"))
            })?;
            let expected = schema.dimension.unwrap_or(0);
            if vector.len() != expected {
                return Err(dimension_mismatch(field, expected, vector.len()));
            }
            check_finite(field, vector)?;
        }
        Ok(())
    }

    fn project_all(
        &self,
        scored: Vec<(i64, f64)>,
        columns: Option<&[String]>,
    ) -> Vec<SearchResult> {
        scored
            .into_iter()
            .filter_map(|(id, score)| self.records.get(&id).map(|r| project(id, score, r, columns)))
            .collect()
    }

    /// Distances from a record to each queried field it carries, in request order.
    fn field_distances(
        record: &Record,
        request: &SearchRequest,
    ) -> impl Iterator<Item = Option<f64>> {
        request.vectors.iter().map(move |(field, query)| {
            record.vector(field).map(|stored| request.metric.distance(stored, query))
        })
    }
}

/// An in-memory vector store with exact search.
///
/// Collections are stored as nested maps: collection name → primary key →
/// record. `search` is disjunctive: each record scores its minimum distance
/// over the queried fields it carries. `hybrid_search` is conjunctive: only
/// records carrying every queried field are ranked. Neither depends on the
/// order of fields in the request.
///
/// # Example
///
/// ```rust,ignore
/// use adk_retrieval::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", schema).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
    /// `None` projects every non-vector field.
    columns: RwLock<Option<Vec<String>>>,
    span: Span,
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            columns: RwLock::new(None),
            span: tracing::info_span!("vector_store", backend = MEMORY_BACKEND),
        }
    }
}

fn project(id: i64, score: f64, record: &Record, columns: Option<&[String]>) -> SearchResult {
    let fields = match columns {
        Some(columns) => columns
            .iter()
            .filter_map(|name| record.get(name).map(|v| (name.clone(), v.clone())))
            .collect(),
        None => record
            .fields
            .iter()
            .filter(|(_, v)| v.as_vector().is_none())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };
    SearchResult { id, score, fields }
}

fn sort_by_distance(scored: &mut [(i64, f64)]) {
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit this store's events under `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Index hint recorded for `field` by [`VectorStore::create_index`].
    pub async fn index_params(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<Option<IndexParams>> {
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| RetrievalError::collection_not_found(collection))?;
        Ok(target.indexes.get(field).cloned())
    }

    /// Whether [`VectorStore::load_collection`] was called for `collection`.
    pub async fn is_loaded(&self, collection: &str) -> Result<bool> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.loaded)
            .ok_or_else(|| RetrievalError::collection_not_found(collection))
    }

    async fn projection(&self) -> Option<Vec<String>> {
        self.columns.read().await.clone()
    }

    async fn scan(&self, collection: &str, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        request.check_cancelled("vector search")?;
        let columns = self.projection().await;
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| RetrievalError::collection_not_found(collection))?;
        target.validate_query(request)?;
        if request.top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(i64, f64)> = target
            .records
            .iter()
            .filter_map(|(id, record)| {
                Collection::field_distances(record, request)
                    .flatten()
                    .reduce(f64::min)
                    .map(|distance| (*id, distance))
            })
            .collect();
        request.check_cancelled("vector search")?;

        sort_by_distance(&mut scored);
        scored.truncate(request.top_k);
        let results = target.project_all(scored, columns.as_deref());

        debug!(
            collection,
            metric = %request.metric,
            result_count = results.len(),
            "search completed"
        );
        Ok(results)
    }

    async fn scan_all_fields(
        &self,
        collection: &str,
        request: &SearchRequest,
        reranker: Option<&dyn Reranker>,
    ) -> Result<Vec<SearchResult>> {
        request.check_cancelled("hybrid search")?;
        let columns = self.projection().await;
        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| RetrievalError::collection_not_found(collection))?;
        target.validate_query(request)?;
        if request.top_k == 0 {
            return Ok(Vec::new());
        }

        // Records carrying every queried field, with distances in request order.
        let matched: Vec<(i64, Vec<f64>)> = target
            .records
            .iter()
            .filter_map(|(id, record)| {
                let distances: Option<Vec<f64>> =
                    Collection::field_distances(record, request).collect();
                distances.map(|d| (*id, d))
            })
            .collect();
        request.check_cancelled("hybrid search")?;

        let mut results = match reranker {
            None => {
                let mut scored: Vec<(i64, f64)> = matched
                    .into_iter()
                    .map(|(id, d)| (id, d.iter().sum::<f64>() / d.len() as f64))
                    .collect();
                sort_by_distance(&mut scored);
                target.project_all(scored, columns.as_deref())
            }
            Some(reranker) => {
                let rankings: Vec<Vec<SearchResult>> = (0..request.vectors.len())
                    .map(|field| {
                        let mut scored: Vec<(i64, f64)> =
                            matched.iter().map(|(id, d)| (*id, d[field])).collect();
                        sort_by_distance(&mut scored);
                        target.project_all(scored, columns.as_deref())
                    })
                    .collect();
                let lists: Vec<RankedList<'_>> =
                    rankings.iter().map(|r| RankedList::new(r, 1.0)).collect();
                reranker.fuse(&lists)
            }
        };
        results.truncate(request.top_k);

        debug!(
            collection,
            fields = request.vectors.len(),
            reranked = reranker.is_some(),
            result_count = results.len(),
            "hybrid search completed"
        );
        Ok(results)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        MEMORY_BACKEND
    }

    async fn connect(&self) -> Result<()> {
        self.span.in_scope(|| debug!("connected"));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.span.in_scope(|| debug!("closed"));
        Ok(())
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection(&self, name: &str, schema: CollectionSchema) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(RetrievalError::AlreadyExists {
                kind: "collection",
                name: name.to_string(),
            });
        }
        let fields = schema.fields.len();
        collections.insert(name.to_string(), Collection::new(schema)?);
        self.span.in_scope(|| info!(collection = name, fields, "created collection"));
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let dropped = collections
            .remove(name)
            .ok_or_else(|| RetrievalError::collection_not_found(name))?;
        self.span.in_scope(|| {
            info!(collection = name, records = dropped.records.len(), "dropped collection")
        });
        Ok(())
    }

    async fn insert(&self, collection: &str, records: Vec<Record>) -> Result<InsertReport> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| RetrievalError::collection_not_found(collection))?;

        let mut report = InsertReport::default();
        for (position, record) in records.into_iter().enumerate() {
            match target.prepare(record) {
                Ok((id, record)) => {
                    target.records.insert(id, record);
                    report.succeeded.push(id);
                }
                Err(e) => {
                    self.span.in_scope(|| {
                        debug!(collection, position, error = %e, "skipped malformed record")
                    });
                    report.record_failure(position, None, &e);
                }
            }
        }

        self.span.in_scope(|| {
            debug!(
                collection,
                inserted = report.succeeded.len(),
                failed = report.failed.len(),
                total = target.records.len(),
                "inserted records"
            )
        });
        Ok(report)
    }

    async fn delete(&self, collection: &str, ids: &[i64]) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| RetrievalError::collection_not_found(collection))?;
        let removed = ids.iter().filter(|id| target.records.remove(*id).is_some()).count();
        self.span.in_scope(|| {
            debug!(collection, requested = ids.len(), removed, "deleted records")
        });
        Ok(removed)
    }

    async fn flush(&self, collection: &str) -> Result<()> {
        if !self.has_collection(collection).await? {
            return Err(RetrievalError::collection_not_found(collection));
        }
        Ok(())
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| RetrievalError::collection_not_found(collection))?;
        if !target.schema.field(field).is_some_and(|f| f.is_vector()) {
            return Err(RetrievalError::InvalidArgument(format!(
                "cannot index '{field}': not a vector field"
            )));
        }
        target.indexes.insert(field.to_string(), params.clone());
        self.span.in_scope(|| {
            debug!(collection, field, index_type = ?params.index_type, "recorded index hint")
        });
        Ok(())
    }

    async fn load_collection(&self, collection: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| RetrievalError::collection_not_found(collection))?;
        target.loaded = true;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        request: &SearchRequest,
    ) -> Result<Vec<SearchResult>> {
        self.scan(collection, request).instrument(self.span.clone()).await
    }

    async fn hybrid_search(
        &self,
        collection: &str,
        request: &SearchRequest,
        reranker: Option<&dyn Reranker>,
    ) -> Result<Vec<SearchResult>> {
        self.scan_all_fields(collection, request, reranker).instrument(self.span.clone()).await
    }

    async fn set_column_names(&self, columns: Vec<String>) -> Result<()> {
        *self.columns.write().await = Some(columns);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.records.len())
            .ok_or_else(|| RetrievalError::collection_not_found(collection))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema> {
        let collections = self.collections.read().await;
        collections
            .get(name)
            .map(|c| c.schema.clone())
            .ok_or_else(|| RetrievalError::collection_not_found(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::reranker::RrfReranker;
    use crate::schema::{DataType, FieldSchema, MetricType};

    fn schema(auto_id: bool) -> CollectionSchema {
        CollectionSchema::new()
            .with_field(FieldSchema::primary_key("id", auto_id))
            .with_field(FieldSchema::scalar("text", DataType::VarChar))
            .with_field(FieldSchema::vector("title", 2))
            .with_field(FieldSchema::vector("body", 2))
    }

    fn record(id: i64, title: Option<[f32; 2]>, body: Option<[f32; 2]>) -> Record {
        let mut record = Record::new().with("id", id).with("text", format!("record {id}"));
        if let Some(v) = title {
            record.insert("title", v.to_vec());
        }
        if let Some(v) = body {
            record.insert("body", v.to_vec());
        }
        record
    }

    async fn store_with(records: Vec<Record>) -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", schema(false)).await.unwrap();
        let report = store.insert("docs", records).await.unwrap();
        assert!(report.is_complete(), "{:?}", report.failed);
        store
    }

    fn ids(results: &[SearchResult]) -> Vec<i64> {
        results.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn identical_vectors_rank_first_under_l2() {
        let store = store_with(vec![
            record(1, Some([1.0, 1.0]), None),
            record(2, Some([1.0, 1.0]), None),
            record(3, Some([9.0, -9.0]), None),
        ])
        .await;
        let request = SearchRequest::new(1).with_vector("title", vec![1.0, 1.0]);
        let results = store.search("docs", &request).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].id == 1 || results[0].id == 2);
        assert_eq!(results[0].score, 0.0);
    }

    #[tokio::test]
    async fn inner_product_is_reported_negated() {
        let store = store_with(vec![
            record(1, Some([1.0, 0.0]), None),
            record(2, Some([3.0, 0.0]), None),
        ])
        .await;
        let request =
            SearchRequest::new(2).with_vector("title", vec![1.0, 0.0]).with_metric(MetricType::Ip);
        let results = store.search("docs", &request).await.unwrap();
        assert_eq!(ids(&results), vec![2, 1]);
        assert_eq!(results[0].score, -3.0);
    }

    #[tokio::test]
    async fn search_uses_closest_present_field_regardless_of_order() {
        let store = store_with(vec![
            record(1, Some([0.0, 0.0]), Some([5.0, 5.0])),
            record(2, None, Some([1.0, 1.0])),
        ])
        .await;
        let forward = SearchRequest::new(10)
            .with_vector("title", vec![5.0, 5.0])
            .with_vector("body", vec![5.0, 5.0]);
        let reverse = SearchRequest::new(10)
            .with_vector("body", vec![5.0, 5.0])
            .with_vector("title", vec![5.0, 5.0]);

        let a = store.search("docs", &forward).await.unwrap();
        let b = store.search("docs", &reverse).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(ids(&a), vec![1, 2]);
        assert_eq!(a[0].score, 0.0);
    }

    #[tokio::test]
    async fn hybrid_search_requires_every_field_and_averages() {
        let store = store_with(vec![
            record(1, Some([0.0, 0.0]), Some([0.0, 2.0])),
            record(2, None, Some([0.0, 0.0])),
        ])
        .await;
        let request = SearchRequest::new(10)
            .with_vector("title", vec![0.0, 0.0])
            .with_vector("body", vec![0.0, 0.0]);
        let results = store.hybrid_search("docs", &request, None).await.unwrap();
        assert_eq!(ids(&results), vec![1]);
        assert_eq!(results[0].score, 1.0);
    }

    #[tokio::test]
    async fn hybrid_search_with_reranker_fuses_field_rankings() {
        let store = store_with(vec![
            record(1, Some([0.0, 0.0]), Some([3.0, 0.0])),
            record(2, Some([1.0, 0.0]), Some([1.0, 0.0])),
            record(3, Some([3.0, 0.0]), Some([0.0, 0.0])),
        ])
        .await;
        let request = SearchRequest::new(2)
            .with_vector("title", vec![0.0, 0.0])
            .with_vector("body", vec![0.0, 0.0]);
        let reranker = RrfReranker::default();
        let results = store.hybrid_search("docs", &request, Some(&reranker)).await.unwrap();
        // Record 2 is second in both field rankings; 1 and 3 each lead one of them.
        assert_eq!(ids(&results), vec![1, 3]);
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn missing_and_duplicate_collections_are_typed_errors() {
        let store = InMemoryVectorStore::new();
        let request = SearchRequest::new(1).with_vector("title", vec![0.0, 0.0]);
        let err = store.search("missing", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.insert("missing", vec![]).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.drop_collection("missing").await.unwrap_err().kind(), ErrorKind::NotFound);

        store.create_collection("docs", schema(false)).await.unwrap();
        let err = store.create_collection("docs", schema(false)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", schema(false)).await.unwrap();
        let report = store
            .insert(
                "docs",
                vec![
                    record(1, Some([0.0, 0.0]), None),
                    Record::new().with("id", 2i64).with("title", vec![0.0f32; 3]),
                    record(1, Some([1.0, 1.0]), None),
                    Record::new().with("title", vec![0.0f32; 2]),
                    record(4, None, Some([1.0, 1.0])),
                ],
            )
            .await
            .unwrap();
        assert_eq!(report.succeeded, vec![1, 4]);
        let positions: Vec<usize> = report.failed.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(report.failed[1].kind, ErrorKind::AlreadyExists);
        assert_eq!(store.count("docs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn query_dimension_mismatch_is_invalid() {
        let store = store_with(vec![record(1, Some([0.0, 0.0]), None)]).await;
        let request = SearchRequest::new(1).with_vector("title", vec![0.0, 0.0, 0.0]);
        let err = store.search("docs", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let request = SearchRequest::new(1).with_vector("text", vec![0.0, 0.0]);
        assert!(store.search("docs", &request).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_only_stored_keys() {
        let store = store_with(vec![
            record(1, Some([0.0, 0.0]), None),
            record(2, Some([1.0, 0.0]), None),
        ])
        .await;
        assert_eq!(store.delete("docs", &[2, 9]).await.unwrap(), 1);
        assert_eq!(store.count("docs").await.unwrap(), 1);
        let request = SearchRequest::new(5).with_vector("title", vec![1.0, 0.0]);
        assert_eq!(ids(&store.search("docs", &request).await.unwrap()), vec![1]);
        assert_eq!(store.delete("missing", &[1]).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn non_finite_vectors_are_rejected() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", schema(false)).await.unwrap();
        let records: Vec<Record> = (0..200)
            .map(|i| {
                let x = match i % 3 {
                    0 => f32::NAN,
                    1 => i as f32,
                    _ => f32::INFINITY,
                };
                record(i, Some([x, 0.0]), None)
            })
            .collect();
        let report = store.insert("docs", records).await.unwrap();
        assert_eq!(report.succeeded.len(), 67);
        assert_eq!(report.failed.len(), 133);
        assert!(report.failed.iter().all(|f| f.kind == ErrorKind::InvalidArgument));

        let results = store
            .search("docs", &SearchRequest::new(200).with_vector("title", vec![0.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(results.len(), 67);
        assert_eq!(results[0].id, 1);
        assert!(results.windows(2).all(|w| w[0].score <= w[1].score));

        let request = SearchRequest::new(1).with_vector("title", vec![f32::NAN, 0.0]);
        let err = store.search("docs", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn auto_id_assigns_increasing_keys() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", schema(true)).await.unwrap();
        let vector = Record::new().with("title", vec![0.0f32, 0.0]);
        let report = store.insert("docs", vec![vector.clone(), vector.clone()]).await.unwrap();
        assert_eq!(report.succeeded, vec![1, 2]);

        let explicit = vector.with("id", 9i64);
        let report = store.insert("docs", vec![explicit]).await.unwrap();
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test]
    async fn column_projection() {
        let store = store_with(vec![record(1, Some([0.0, 0.0]), None)]).await;
        let request = SearchRequest::new(1).with_vector("title", vec![0.0, 0.0]);

        let default = store.search("docs", &request).await.unwrap();
        assert_eq!(default[0].text(), Some("record 1"));
        assert!(!default[0].fields.contains_key("title"));

        store.set_column_names(vec!["title".to_string()]).await.unwrap();
        let projected = store.search("docs", &request).await.unwrap();
        assert!(projected[0].fields.contains_key("title"));
        assert!(!projected[0].fields.contains_key("text"));

        store.set_column_names(Vec::new()).await.unwrap();
        assert!(store.search("docs", &request).await.unwrap()[0].fields.is_empty());
    }

    #[tokio::test]
    async fn lifecycle_and_introspection() {
        let store = InMemoryVectorStore::new();
        store.connect().await.unwrap();
        store.create_collection("b", schema(false)).await.unwrap();
        store.create_collection("a", schema(false)).await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.describe_collection("a").await.unwrap(), schema(false));

        let params = IndexParams::default();
        store.create_index("a", "title", &params).await.unwrap();
        assert_eq!(store.index_params("a", "title").await.unwrap(), Some(params.clone()));
        assert!(store.create_index("a", "text", &params).await.is_err());
        assert!(!store.is_loaded("a").await.unwrap());
        store.load_collection("a").await.unwrap();
        assert!(store.is_loaded("a").await.unwrap());
        store.flush("a").await.unwrap();

        store.drop_collection("a").await.unwrap();
        assert!(!store.has_collection("a").await.unwrap());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_search_fails() {
        let store = store_with(vec![record(1, Some([0.0, 0.0]), None)]).await;
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let request =
            SearchRequest::new(1).with_vector("title", vec![0.0, 0.0]).with_cancellation(token);
        let err = store.search("docs", &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
