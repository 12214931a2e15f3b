//! Data types for documents, chunks, and search results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{Metadata, Value};

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Caller-assigned identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: Metadata,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: Metadata::new(), source_uri: None }
    }
}

/// An ordered, token-bounded span of sentences produced by a
/// [`Chunker`](crate::chunking::Chunker).
///
/// `start_sentence..end_sentence` indexes into the sentence sequence of the
/// source text, so consecutive chunks can be mapped back to document order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk's sentences joined by single spaces.
    pub text: String,
    /// Sum of the token counts of the chunk's sentences.
    pub token_count: usize,
    /// Index of the first sentence in the chunk.
    pub start_sentence: usize,
    /// Index one past the last sentence in the chunk.
    pub end_sentence: usize,
}

impl Chunk {
    /// Number of sentences in the chunk.
    pub fn sentence_count(&self) -> usize {
        self.end_sentence - self.start_sentence
    }
}

/// A chunk's text together with one embedding per named field.
///
/// Multi-field strategies (e.g. `"title"` vs `"body"`) store one vector per
/// field; single-field pipelines use one entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    pub text: String,
    pub embeddings: BTreeMap<String, Vec<f32>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl EmbeddedChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn with_embedding(mut self, field: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.insert(field.into(), vector);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A ranked hit from a dense search, a sparse search, or a fusion.
///
/// Score direction depends on the producer: vector store distances are
/// "smaller is closer" (inner product is reported negated), while BM25 and
/// fused RRF scores are "larger is better".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: i64,
    pub score: f64,
    pub fields: BTreeMap<String, Value>,
}

impl SearchResult {
    pub fn new(id: i64, score: f64) -> Self {
        Self { id, score, fields: BTreeMap::new() }
    }

    /// The `text` or `content` field, whichever the producer projected.
    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").or_else(|| self.fields.get("content")).and_then(Value::as_str)
    }
}
