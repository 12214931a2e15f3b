//! # adk-retrieval
//!
//! Hybrid dense + sparse retrieval for ADK-Rust.
//!
//! ## Overview
//!
//! Documents are split into overlapping sentence-aligned chunks, embedded,
//! and stored twice: once in a [`VectorStore`] for nearest-neighbour search
//! and once in a BM25 [`SparseIndex`] for lexical search. At query time the
//! two ranked lists are merged with weighted Reciprocal Rank Fusion.
//!
//! - [`SentenceChunker`] - token-budgeted chunking with sentence-level overlap
//! - [`Bm25Index`] - in-memory Okapi BM25 inverted index
//! - [`InMemoryVectorStore`] - brute-force multi-field vector store
//! - [`RrfReranker`] - weighted Reciprocal Rank Fusion
//! - [`HybridRetriever`] - ingest and query orchestration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use adk_retrieval::{Document, HybridRetriever, RetrievalConfig};
//! use std::sync::Arc;
//!
//! let retriever = HybridRetriever::builder()
//!     .config(RetrievalConfig::builder().chunk_size(256).top_k(5).build()?)
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! retriever.create_collection("docs").await?;
//! retriever.ingest("docs", &Document::new("doc-1", "Rust is fast. It is safe.")).await?;
//! let results = retriever.query("docs", "safe systems language").await?;
//! ```
//!
//! ## Features
//!
//! - `tokenizers` - exact sub-word token counting via HuggingFace tokenizers

pub mod bm25;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod reranker;
pub mod schema;
pub mod sentence;
pub mod sparse;
pub mod telemetry;
pub mod tokenizer;
pub mod value;
pub mod vectorstore;

pub use bm25::{Bm25Index, IndexStats};
pub use chunking::{Chunker, ChunkerConfig, SentenceChunker};
pub use config::{Bm25Config, FusionConfig, RetrievalConfig, RetrievalConfigBuilder};
pub use document::{Chunk, Document, EmbeddedChunk, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{BatchFailure, BatchReport, ErrorKind, Result, RetrievalError};
pub use inmemory::InMemoryVectorStore;
pub use parser::{DocumentParser, ParsedDocument, PlainTextParser};
pub use pipeline::{
    HybridRetriever, HybridRetrieverBuilder, IngestFailure, IngestReport, IngestedChunk,
};
pub use registry::{BackendConfig, BackendRegistry};
pub use reranker::{RankedList, Reranker, RrfReranker};
pub use schema::{CollectionSchema, DataType, FieldSchema, IndexParams, IndexType, MetricType};
pub use sentence::{AbbreviationAwareSplitter, PunctuationSplitter, SentenceSplitter};
pub use sparse::{DefaultPreprocessor, Preprocessor, SparseIndex};
pub use telemetry::{TelemetryFormat, init_tracing};
#[cfg(feature = "tokenizers")]
pub use tokenizer::HuggingFaceTokenCounter;
pub use tokenizer::{CharRatioTokenCounter, TokenCounter, WhitespaceTokenCounter};
pub use value::{Metadata, Record, Value};
pub use vectorstore::{SearchRequest, VectorStore};
