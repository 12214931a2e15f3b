//! Configuration for the hybrid retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::bm25::{DEFAULT_B, DEFAULT_K1};
use crate::chunking::ChunkerConfig;
use crate::error::{Result, RetrievalError};
use crate::registry::BackendConfig;
use crate::reranker::DEFAULT_RRF_K;
use crate::schema::MetricType;

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bm25Config {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: DEFAULT_K1, b: DEFAULT_B }
    }
}

/// Reciprocal Rank Fusion parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FusionConfig {
    pub k: f64,
    pub dense_weight: f64,
    pub sparse_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K, dense_weight: 0.5, sparse_weight: 0.5 }
    }
}

/// Configuration parameters for the hybrid retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub chunking: ChunkerConfig,
    pub bm25: Bm25Config,
    pub fusion: FusionConfig,
    /// Number of fused results returned by a query.
    pub top_k: usize,
    /// Number of candidates taken from each of the dense and sparse paths before fusion.
    pub candidate_pool: usize,
    /// Name of the vector field holding chunk embeddings.
    pub vector_field: String,
    /// Distance metric name; unknown names fall back to `L2`.
    pub metric: String,
    pub backend: BackendConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkerConfig::default(),
            bm25: Bm25Config::default(),
            fusion: FusionConfig::default(),
            top_k: 10,
            candidate_pool: 50,
            vector_field: "embedding".to_string(),
            metric: MetricType::L2.to_string(),
            backend: BackendConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Create a new builder for constructing a [`RetrievalConfig`].
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }

    /// Deserialize a configuration from JSON and validate it.
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RetrievalError::ConfigError(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// The configured metric, parsed leniently.
    pub fn metric_type(&self) -> MetricType {
        MetricType::parse_lenient(&self.metric)
    }

    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] if:
    /// - the chunking config is invalid
    /// - `top_k == 0` or `candidate_pool < top_k`
    /// - `k1 < 0` or `b` is outside `[0, 1]`
    /// - `vector_field` is empty
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.top_k == 0 {
            return Err(RetrievalError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.candidate_pool < self.top_k {
            return Err(RetrievalError::ConfigError(format!(
                "candidate_pool ({}) must be at least top_k ({})",
                self.candidate_pool, self.top_k
            )));
        }
        if !self.bm25.k1.is_finite() || self.bm25.k1 < 0.0 {
            return Err(RetrievalError::ConfigError(format!(
                "bm25.k1 must be non-negative, got {}",
                self.bm25.k1
            )));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(RetrievalError::ConfigError(format!(
                "bm25.b must be within [0, 1], got {}",
                self.bm25.b
            )));
        }
        if self.vector_field.trim().is_empty() {
            return Err(RetrievalError::ConfigError("vector_field must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Set the target chunk size in tokens.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunking.target_chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in tokens.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunking.overlap = overlap;
        self
    }

    pub fn bm25(mut self, k1: f64, b: f64) -> Self {
        self.config.bm25 = Bm25Config { k1, b };
        self
    }

    pub fn rrf_k(mut self, k: f64) -> Self {
        self.config.fusion.k = k;
        self
    }

    /// Set the dense and sparse fusion weights. They are normalized at fusion time.
    pub fn weights(mut self, dense_weight: f64, sparse_weight: f64) -> Self {
        self.config.fusion.dense_weight = dense_weight;
        self.config.fusion.sparse_weight = sparse_weight;
        self
    }

    /// Set the number of fused results to return.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn candidate_pool(mut self, n: usize) -> Self {
        self.config.candidate_pool = n;
        self
    }

    pub fn vector_field(mut self, field: impl Into<String>) -> Self {
        self.config.vector_field = field.into();
        self
    }

    pub fn metric(mut self, metric: impl Into<String>) -> Self {
        self.config.metric = metric.into();
        self
    }

    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.config.backend = backend;
        self
    }

    /// Build the [`RetrievalConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::ConfigError`] as described in
    /// [`RetrievalConfig::validate`].
    pub fn build(self) -> Result<RetrievalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
