//! Embedding provider trait for generating vector embeddings from text.
//!
//! Providers are external collaborators (typically an HTTP API). Any failure
//! they report is fatal to the current embedding operation and is never
//! retried here.

use async_trait::async_trait;

use crate::error::{Result, RetrievalError};

/// A provider that generates fixed-dimension vector embeddings from text.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use adk_retrieval::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Name used when wrapping this provider's failures.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Check a provider's output has one vector per input, each of the advertised dimension.
///
/// # Errors
///
/// Returns [`RetrievalError::ProviderFailure`] naming the provider otherwise.
pub fn check_embeddings(
    provider: &dyn EmbeddingProvider,
    expected_count: usize,
    embeddings: &[Vec<f32>],
) -> Result<()> {
    if embeddings.len() != expected_count {
        return Err(RetrievalError::provider(
            provider.name(),
            format!("returned {} embeddings for {expected_count} inputs", embeddings.len()),
        ));
    }
    let dimensions = provider.dimensions();
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
        return Err(RetrievalError::provider(
            provider.name(),
            format!("returned a {}-dimensional embedding, expected {dimensions}", bad.len()),
        ));
    }
    Ok(())
}
