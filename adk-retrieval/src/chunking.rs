//! Sentence-aware, token-bounded document chunking.
//!
//! This module provides the [`Chunker`] trait and [`SentenceChunker`], which
//! greedily packs sentences into chunks of at most `target_chunk_size` tokens
//! and seeds each new chunk with a backward overlap of roughly `overlap`
//! tokens taken from the end of the previous one.
//!
//! Chunking is a pure function of the input text and the configuration, so a
//! chunker can be shared across threads and re-run to reproduce the same
//! sequence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Span, debug};

use crate::document::{Chunk, Document};
use crate::error::{Result, RetrievalError};
use crate::sentence::{PunctuationSplitter, SentenceSplitter};
use crate::tokenizer::{TokenCounter, WhitespaceTokenCounter};
use crate::value::Metadata;

/// A strategy for splitting text into ordered chunks.
pub trait Chunker: Send + Sync {
    /// Split text into chunks in document order.
    ///
    /// Returns an empty `Vec` if the text contains no sentences.
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    /// Chunk a document, returning each chunk with the document's metadata plus
    /// `document_id`, `chunk_index`, `start_sentence`, and `end_sentence`.
    fn chunk_document(&self, document: &Document) -> Vec<(Chunk, Metadata)> {
        self.chunk(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("document_id".to_string(), document.id.clone().into());
                metadata.insert("chunk_index".to_string(), i.into());
                metadata.insert("start_sentence".to_string(), chunk.start_sentence.into());
                metadata.insert("end_sentence".to_string(), chunk.end_sentence.into());
                (chunk, metadata)
            })
            .collect()
    }
}

/// Token budget for [`SentenceChunker`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Target maximum tokens per chunk.
    pub target_chunk_size: usize,
    /// Tokens carried over from the end of one chunk into the next.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { target_chunk_size: 512, overlap: 64 }
    }
}

impl ChunkerConfig {
    pub fn new(target_chunk_size: usize, overlap: usize) -> Self {
        Self { target_chunk_size, overlap }
    }

    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if `target_chunk_size == 0` or
    /// `overlap >= target_chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.target_chunk_size == 0 {
            return Err(RetrievalError::ConfigError(
                "target_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.target_chunk_size {
            return Err(RetrievalError::ConfigError(format!(
                "overlap ({}) must be less than target_chunk_size ({})",
                self.overlap, self.target_chunk_size
            )));
        }
        Ok(())
    }
}

/// Packs whole sentences into overlapping, token-bounded chunks.
///
/// # Algorithm
///
/// 1. Split the text into sentences with the configured [`SentenceSplitter`].
/// 2. Accumulate sentences while tracking a running token count.
/// 3. When the next sentence would push the count over `target_chunk_size`,
///    close the current chunk.
/// 4. Seed the next chunk by walking backward from the end of the closed chunk
///    until the seeded sentences reach `overlap` tokens (or the chunk start).
///
/// A chunk is only closed once it holds at least one sentence beyond its
/// overlap seed, so a chunk can exceed the target by at most that seed. A
/// sentence larger than the target is never split or dropped: it closes the
/// chunk before it and is the only new sentence of the next one. Without
/// overlap that chunk holds the sentence alone; with overlap it still starts
/// with the seed, so token counts `[2, 2, 10]` at target 4 and overlap 2 give
/// sentence ranges `0..2` and `1..3`.
///
/// # Example
///
/// ```rust,ignore
/// use adk_retrieval::{ChunkerConfig, SentenceChunker, Chunker};
///
/// let chunker = SentenceChunker::new(ChunkerConfig::new(256, 32))?;
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Clone)]
pub struct SentenceChunker {
    config: ChunkerConfig,
    token_counter: Arc<dyn TokenCounter>,
    splitter: Arc<dyn SentenceSplitter>,
    span: Span,
}

impl std::fmt::Debug for SentenceChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceChunker").field("config", &self.config).finish_non_exhaustive()
    }
}

impl SentenceChunker {
    /// Create a chunker with whitespace token counting and punctuation splitting.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if the config is invalid.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            token_counter: Arc::new(WhitespaceTokenCounter),
            splitter: Arc::new(PunctuationSplitter),
            span: tracing::debug_span!("chunker"),
        })
    }

    pub fn with_token_counter(mut self, token_counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = token_counter;
        self
    }

    pub fn with_splitter(mut self, splitter: Arc<dyn SentenceSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    /// Emit this chunker's events under `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Index where the overlap seed for a chunk closing at `end` begins.
    fn overlap_start(&self, counts: &[usize], start: usize, end: usize) -> usize {
        if self.config.overlap == 0 {
            return end;
        }
        let mut seeded = 0;
        let mut i = end;
        while i > start {
            i -= 1;
            seeded += counts[i];
            if seeded >= self.config.overlap {
                break;
            }
        }
        i
    }
}

fn build_chunk(sentences: &[String], start: usize, end: usize, token_count: usize) -> Chunk {
    Chunk {
        text: sentences[start..end].join(" "),
        token_count,
        start_sentence: start,
        end_sentence: end,
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        let _guard = self.span.enter();

        let sentences = self.splitter.split(text);
        if sentences.is_empty() {
            return Vec::new();
        }
        let counts: Vec<usize> = sentences.iter().map(|s| self.token_counter.count(s)).collect();

        let mut chunks = Vec::new();
        let mut start = 0;
        // First sentence of the current chunk that was not inherited as overlap.
        let mut fresh = 0;
        let mut running = 0;

        for (idx, &tokens) in counts.iter().enumerate() {
            if running + tokens > self.config.target_chunk_size && idx > fresh {
                chunks.push(build_chunk(&sentences, start, idx, running));
                start = self.overlap_start(&counts, start, idx);
                running = counts[start..idx].iter().sum();
                fresh = idx;
            }
            running += tokens;
        }
        chunks.push(build_chunk(&sentences, start, sentences.len(), running));

        debug!(sentences = sentences.len(), chunks = chunks.len(), "chunked text");
        chunks
    }
}
