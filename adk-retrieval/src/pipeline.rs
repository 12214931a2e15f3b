//! Hybrid retrieval orchestrator.
//!
//! The [`HybridRetriever`] coordinates the full ingest-and-query workflow by
//! composing an [`EmbeddingProvider`], a [`VectorStore`], one
//! [`SparseIndex`] per collection, a [`Chunker`], and an [`RrfReranker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_retrieval::{HybridRetriever, RetrievalConfig};
//!
//! let retriever = HybridRetriever::builder()
//!     .config(RetrievalConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! retriever.create_collection("docs").await?;
//! retriever.ingest("docs", &document).await?;
//! let results = retriever.query("docs", "search query").await?;
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, warn};

use crate::bm25::Bm25Index;
use crate::chunking::{Chunker, SentenceChunker};
use crate::config::RetrievalConfig;
use crate::document::{Chunk, Document, EmbeddedChunk, SearchResult};
use crate::embedding::{EmbeddingProvider, check_embeddings};
use crate::error::{BatchFailure, ErrorKind, Result, RetrievalError};
use crate::parser::DocumentParser;
use crate::registry::BackendRegistry;
use crate::reranker::RrfReranker;
use crate::schema::{CollectionSchema, DataType, FieldSchema, IndexParams, IndexType, MetricType};
use crate::sparse::SparseIndex;
use crate::value::{Metadata, Record};
use crate::vectorstore::{SearchRequest, VectorStore};

/// Builds the sparse index of a newly created collection.
pub type SparseIndexFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn SparseIndex>> + Send + Sync>;

/// A chunk stored by [`HybridRetriever::ingest`] under `id` in both stores.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedChunk {
    pub id: i64,
    pub chunk: Chunk,
    pub metadata: Metadata,
}

/// A document or path that failed during batch ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestFailure {
    /// Document ID, or the path for [`HybridRetriever::ingest_paths`].
    pub source: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Outcome of a batch ingestion that continues past individual failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Sources that were fully ingested, in submission order.
    pub succeeded: Vec<String>,
    pub chunks: Vec<IngestedChunk>,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, source: String, outcome: Result<Vec<IngestedChunk>>) {
        match outcome {
            Ok(chunks) => {
                self.succeeded.push(source);
                self.chunks.extend(chunks);
            }
            Err(e) => {
                self.failed.push(IngestFailure { source, kind: e.kind(), reason: e.to_string() })
            }
        }
    }
}

/// Turn a rejected record back into a typed error.
fn rejection(failure: &BatchFailure, id: i64) -> RetrievalError {
    match failure.kind {
        ErrorKind::AlreadyExists => {
            RetrievalError::AlreadyExists { kind: "record", name: id.to_string() }
        }
        _ => RetrievalError::InvalidArgument(failure.reason.clone()),
    }
}

/// The hybrid retrieval orchestrator.
///
/// Coordinates document ingestion (chunk → embed → store densely and
/// sparsely under one shared ID) and query execution (embed + tokenize →
/// search both paths → fuse → truncate). Construct one via
/// [`HybridRetriever::builder()`].
pub struct HybridRetriever {
    config: RetrievalConfig,
    metric: MetricType,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    sparse_factory: SparseIndexFactory,
    sparse_indexes: RwLock<HashMap<String, Arc<dyn SparseIndex>>>,
    chunker: Arc<dyn Chunker>,
    reranker: RrfReranker,
    next_id: AtomicI64,
    span: Span,
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("config", &self.config)
            .field("backend", &self.vector_store.backend())
            .finish_non_exhaustive()
    }
}

impl HybridRetriever {
    /// Create a new [`HybridRetrieverBuilder`].
    pub fn builder() -> HybridRetrieverBuilder {
        HybridRetrieverBuilder::default()
    }

    /// Return a reference to the retriever configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Return the sparse index of `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::NotFound`] if the collection was not created
    /// through this retriever.
    pub async fn sparse_index(&self, collection: &str) -> Result<Arc<dyn SparseIndex>> {
        self.sparse_indexes
            .read()
            .await
            .get(collection)
            .cloned()
            .ok_or_else(|| RetrievalError::collection_not_found(collection))
    }

    /// The schema used by [`create_collection`](Self::create_collection).
    pub fn default_schema(&self) -> CollectionSchema {
        CollectionSchema::new()
            .with_field(FieldSchema::primary_key("id", false))
            .with_field(FieldSchema::scalar("text", DataType::VarChar))
            .with_field(FieldSchema::scalar("document_id", DataType::VarChar))
            .with_field(FieldSchema::scalar("chunk_index", DataType::Int64))
            .with_field(FieldSchema::vector(
                self.config.vector_field.clone(),
                self.embedding_provider.dimensions(),
            ))
            .with_description("hybrid retrieval chunks")
    }

    /// Create a collection in the vector store and its sparse index.
    ///
    /// The vector field uses the dimensionality reported by the configured
    /// [`EmbeddingProvider`].
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::AlreadyExists`] if the collection exists, or
    /// the vector store's error.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        let mut sparse_indexes = self.sparse_indexes.write().await;
        if sparse_indexes.contains_key(name) {
            return Err(RetrievalError::AlreadyExists {
                kind: "collection",
                name: name.to_string(),
            });
        }
        let sparse = (self.sparse_factory)(name)?;

        self.vector_store.create_collection(name, self.default_schema()).await.map_err(|e| {
            error!(parent: &self.span, collection = name, error = %e, "create collection failed");
            e
        })?;
        let index = IndexParams::new(IndexType::AutoIndex, self.metric);
        self.vector_store.create_index(name, &self.config.vector_field, &index).await?;
        self.vector_store.load_collection(name).await?;

        sparse_indexes.insert(name.to_string(), sparse);
        info!(
            parent: &self.span,
            collection = name,
            backend = self.vector_store.backend(),
            "created collection"
        );
        Ok(())
    }

    /// Drop a collection from the vector store together with its sparse index.
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        self.vector_store.drop_collection(name).await.map_err(|e| {
            error!(parent: &self.span, collection = name, error = %e, "failed to drop collection");
            e
        })?;
        self.sparse_indexes.write().await.remove(name);
        info!(parent: &self.span, collection = name, "dropped collection");
        Ok(())
    }

    /// Ingest a single document: chunk → embed → store in both indexes.
    ///
    /// Chunks receive fresh IDs from the retriever's allocator. Returns the
    /// stored chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ProviderFailure`] naming the document if
    /// embedding fails, or the first storage error.
    pub async fn ingest(
        &self,
        collection: &str,
        document: &Document,
    ) -> Result<Vec<IngestedChunk>> {
        self.ingest_document(collection, document).instrument(self.span.clone()).await
    }

    /// Ingest multiple documents, continuing past documents that fail.
    pub async fn ingest_batch(&self, collection: &str, documents: &[Document]) -> IngestReport {
        let mut report = IngestReport::default();
        for document in documents {
            let outcome = self.ingest(collection, document).await;
            report.record(document.id.clone(), outcome);
        }
        self.log_report(collection, &report);
        report
    }

    /// Parse and ingest files, continuing past files that fail to parse or ingest.
    ///
    /// Each file becomes a document whose ID is its path.
    pub async fn ingest_paths(
        &self,
        collection: &str,
        parser: &dyn DocumentParser,
        paths: &[PathBuf],
    ) -> IngestReport {
        let mut report = IngestReport::default();
        for path in paths {
            let source = path.display().to_string();
            let outcome = match parser.parse(path).await {
                Ok(parsed) => {
                    let document = Document {
                        id: source.clone(),
                        text: parsed.content,
                        metadata: parsed.metadata,
                        source_uri: Some(source.clone()),
                    };
                    self.ingest(collection, &document).await
                }
                Err(e) => Err(e),
            };
            report.record(source, outcome);
        }
        self.log_report(collection, &report);
        report
    }

    /// Store a pre-embedded chunk under a caller-chosen ID.
    ///
    /// Every entry of `chunk.embeddings` becomes a vector field of the record
    /// and the text is added to the sparse index. The ID allocator skips past
    /// `id` so later [`ingest`](Self::ingest) calls never collide with it.
    pub async fn index_embedded(
        &self,
        collection: &str,
        id: i64,
        chunk: &EmbeddedChunk,
    ) -> Result<()> {
        let sparse = self.sparse_index(collection).await?;

        let mut record = Record { fields: chunk.metadata.clone() };
        for (field, vector) in &chunk.embeddings {
            record.insert(field.clone(), vector.clone());
        }
        record.insert("id", id);
        record.insert("text", chunk.text.clone());

        let report = self.vector_store.insert(collection, vec![record]).await?;
        if let Some(failure) = report.failed.first() {
            warn!(parent: &self.span, collection, id, reason = %failure.reason, "chunk rejected");
            return Err(rejection(failure, id));
        }
        if let Err(e) = sparse.add(id, &chunk.text, chunk.metadata.clone()).await {
            self.roll_back(collection, sparse.as_ref(), &[id], &[])
                .instrument(self.span.clone())
                .await;
            return Err(e);
        }
        self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
        Ok(())
    }

    /// Query both paths and fuse: embed + BM25 → top `candidate_pool` each → RRF → `top_k`.
    pub async fn query(&self, collection: &str, query: &str) -> Result<Vec<SearchResult>> {
        self.query_with(collection, query, &CancellationToken::new()).await
    }

    /// Like [`query`](Self::query), checking `cancel` between the coarse steps.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::Cancelled`] if `cancel` fires before fusion
    /// - [`RetrievalError::ProviderFailure`] if the query embedding fails
    /// - [`RetrievalError::NotFound`] if the collection does not exist
    pub async fn query_with(
        &self,
        collection: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        self.run_query(collection, query, cancel).instrument(self.span.clone()).await
    }

    async fn ingest_document(
        &self,
        collection: &str,
        document: &Document,
    ) -> Result<Vec<IngestedChunk>> {
        let sparse = self.sparse_index(collection).await?;

        // 1. Chunk the document
        let chunks = self.chunker.chunk_document(document);
        if chunks.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(Vec::new());
        }

        // 2. Embed every chunk
        let texts: Vec<&str> = chunks.iter().map(|(c, _)| c.text.as_str()).collect();
        let provider = self.embedding_provider.as_ref();
        let embeddings = provider
            .embed_batch(&texts)
            .await
            .and_then(|embeddings| {
                check_embeddings(provider, texts.len(), &embeddings)?;
                Ok(embeddings)
            })
            .map_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
                RetrievalError::provider(
                    provider.name(),
                    format!("embedding failed for document '{}': {e}", document.id),
                )
            })?;

        // 3. Allocate one contiguous block of IDs
        let first_id = self.next_id.fetch_add(chunks.len() as i64, Ordering::SeqCst);
        let ingested: Vec<IngestedChunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, (chunk, metadata))| IngestedChunk {
                id: first_id + i as i64,
                chunk,
                metadata,
            })
            .collect();

        // 4. Insert into the vector store
        let records: Vec<Record> = ingested
            .iter()
            .zip(embeddings)
            .map(|(item, embedding)| {
                let mut record = Record { fields: item.metadata.clone() };
                record.insert("id", item.id);
                record.insert("text", item.chunk.text.clone());
                record.insert(self.config.vector_field.clone(), embedding);
                record
            })
            .collect();
        let report = self.vector_store.insert(collection, records).await?;
        if let Some(failure) = report.failed.first() {
            let id = first_id + failure.position as i64;
            error!(document.id = %document.id, id, reason = %failure.reason, "chunk rejected");
            self.roll_back(collection, sparse.as_ref(), &report.succeeded, &[]).await;
            return Err(rejection(failure, id));
        }

        // 5. Index the text for lexical search
        let mut indexed = Vec::with_capacity(ingested.len());
        for item in &ingested {
            if let Err(e) = sparse.add(item.id, &item.chunk.text, item.metadata.clone()).await {
                error!(
                    document.id = %document.id,
                    id = item.id,
                    error = %e,
                    "sparse indexing failed"
                );
                self.roll_back(collection, sparse.as_ref(), &report.succeeded, &indexed).await;
                return Err(e);
            }
            indexed.push(item.id);
        }

        info!(document.id = %document.id, chunk_count = ingested.len(), "ingested document");
        Ok(ingested)
    }

    /// Undo a partially stored document so neither path returns its chunks.
    ///
    /// Cleanup failures are logged; the caller reports the original error.
    async fn roll_back(
        &self,
        collection: &str,
        sparse: &dyn SparseIndex,
        dense_ids: &[i64],
        sparse_ids: &[i64],
    ) {
        if !dense_ids.is_empty() {
            if let Err(e) = self.vector_store.delete(collection, dense_ids).await {
                warn!(collection, error = %e, "failed to roll back dense records");
            }
        }
        for id in sparse_ids {
            if let Err(e) = sparse.remove(*id).await {
                warn!(collection, id, error = %e, "failed to roll back sparse entry");
            }
        }
        info!(collection, dense = dense_ids.len(), sparse = sparse_ids.len(), "rolled back chunks");
    }

    async fn run_query(
        &self,
        collection: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        check_cancelled(cancel)?;
        let sparse = self.sparse_index(collection).await?;

        // 1. Dense path
        let provider = self.embedding_provider.as_ref();
        let embedding = provider
            .embed(query)
            .await
            .and_then(|embedding| {
                check_embeddings(provider, 1, std::slice::from_ref(&embedding))?;
                Ok(embedding)
            })
            .map_err(|e| {
                error!(error = %e, "embedding failed during query");
                RetrievalError::provider(provider.name(), format!("query embedding failed: {e}"))
            })?;
        check_cancelled(cancel)?;

        let request = SearchRequest::new(self.config.candidate_pool)
            .with_vector(self.config.vector_field.clone(), embedding)
            .with_metric(self.metric)
            .with_cancellation(cancel.clone());
        let dense = self.vector_store.search(collection, &request).await.map_err(|e| {
            error!(collection, error = %e, "vector store search failed");
            e
        })?;
        check_cancelled(cancel)?;

        // 2. Sparse path
        let sparse = sparse.search(query, self.config.candidate_pool).await?;
        check_cancelled(cancel)?;

        // 3. Fuse and truncate
        let fusion = &self.config.fusion;
        let mut results =
            self.reranker.rerank(&dense, &sparse, fusion.dense_weight, fusion.sparse_weight);
        results.truncate(self.config.top_k);

        info!(
            collection,
            dense_count = dense.len(),
            sparse_count = sparse.len(),
            result_count = results.len(),
            "query completed"
        );
        Ok(results)
    }

    fn log_report(&self, collection: &str, report: &IngestReport) {
        self.span.in_scope(|| {
            if report.is_complete() {
                info!(collection, documents = report.succeeded.len(), "batch ingested");
            } else {
                warn!(
                    collection,
                    documents = report.succeeded.len(),
                    failed = report.failed.len(),
                    "batch ingested with failures"
                );
            }
        });
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(RetrievalError::Cancelled("hybrid query".to_string()));
    }
    Ok(())
}

/// Builder for constructing a [`HybridRetriever`].
///
/// `config` and `embedding_provider` are required. Unset components are
/// derived from the config: the vector store from `config.backend` through
/// the registry, BM25 indexes from `config.bm25`, a [`SentenceChunker`] from
/// `config.chunking`, and an [`RrfReranker`] from `config.fusion.k`.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = HybridRetriever::builder()
///     .config(RetrievalConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))  // optional
///     .chunker(Arc::new(chunker))     // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct HybridRetrieverBuilder {
    config: Option<RetrievalConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    registry: Option<BackendRegistry>,
    sparse_factory: Option<SparseIndexFactory>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<RrfReranker>,
    span: Option<Span>,
}

impl HybridRetrieverBuilder {
    /// Set the retriever configuration.
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend, bypassing the registry.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the registry used to resolve `config.backend`.
    pub fn registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the factory building each collection's sparse index.
    pub fn sparse_index_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn SparseIndex>> + Send + Sync + 'static,
    {
        self.sparse_factory = Some(Arc::new(factory));
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn reranker(mut self, reranker: RrfReranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Parent span for the retriever and the components it creates.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the [`HybridRetriever`], validating the config and resolving defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if a required field is missing
    /// or the config is invalid, and [`RetrievalError::NotFound`] if
    /// `config.backend` is not registered.
    pub fn build(self) -> Result<HybridRetriever> {
        let config = self
            .config
            .ok_or_else(|| RetrievalError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RetrievalError::ConfigError("embedding_provider is required".to_string())
        })?;
        let span = self.span.unwrap_or_else(|| tracing::info_span!("hybrid_retriever"));

        let vector_store = match self.vector_store {
            Some(store) => store,
            None => {
                let registry = self.registry.unwrap_or_else(BackendRegistry::with_defaults);
                registry.create(&config.backend)?
            }
        };

        let sparse_factory = match self.sparse_factory {
            Some(factory) => factory,
            None => {
                let (k1, b) = (config.bm25.k1, config.bm25.b);
                let parent = span.clone();
                Arc::new(move |collection: &str| -> Result<Arc<dyn SparseIndex>> {
                    let index = Bm25Index::with_parameters(k1, b)?.with_span(
                        tracing::info_span!(parent: &parent, "bm25_index", collection),
                    );
                    Ok(Arc::new(index) as Arc<dyn SparseIndex>)
                }) as SparseIndexFactory
            }
        };

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(
                SentenceChunker::new(config.chunking)?
                    .with_span(tracing::debug_span!(parent: &span, "chunker")),
            ),
        };
        let reranker = self.reranker.unwrap_or_else(|| {
            RrfReranker::new(config.fusion.k)
                .with_span(tracing::debug_span!(parent: &span, "rrf_reranker"))
        });

        Ok(HybridRetriever {
            metric: config.metric_type(),
            config,
            embedding_provider,
            vector_store,
            sparse_factory,
            sparse_indexes: RwLock::new(HashMap::new()),
            chunker,
            reranker,
            next_id: AtomicI64::new(1),
            span,
        })
    }
}
