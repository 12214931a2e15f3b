//! Error types for the `adk-retrieval` crate.

use thiserror::Error;

/// Errors that can occur in retrieval operations.
///
/// Caller contract violations (a missing collection, a duplicate create, a
/// malformed record) are always returned as typed errors so callers can branch
/// on [`RetrievalError::kind`]. Internal invariants are never surfaced here.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// A named entity (collection, document, backend) does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was looked up, e.g. `"collection"` or `"document"`.
        kind: &'static str,
        /// The name or ID that was not found.
        name: String,
    },

    /// A named entity already exists and cannot be created again.
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// What was being created, e.g. `"collection"` or `"document"`.
        kind: &'static str,
        /// The conflicting name or ID.
        name: String,
    },

    /// The caller passed a malformed argument (schema, metric, dimension, record).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An external collaborator (embedding provider, parser, backend) failed.
    #[error("Provider failure ({provider}): {message}")]
    ProviderFailure {
        /// The collaborator that produced the error.
        provider: String,
        /// A description of the failure, including caller context.
        message: String,
    },

    /// The caller's cancellation token fired between two steps of an operation.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// The class of a [`RetrievalError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    ProviderFailure,
    Cancelled,
    Config,
}

impl RetrievalError {
    /// Return the error class so callers can branch without matching fields.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ProviderFailure { .. } => ErrorKind::ProviderFailure,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::ConfigError(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn collection_not_found(name: &str) -> Self {
        Self::NotFound { kind: "collection", name: name.to_string() }
    }

    pub(crate) fn document_not_found(id: i64) -> Self {
        Self::NotFound { kind: "document", name: id.to_string() }
    }

    /// Wrap a failure from an external collaborator with context.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFailure { provider: provider.into(), message: message.into() }
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// One item of a batch that was reported and skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    /// Position of the item in the submitted batch.
    pub position: usize,
    /// The item's ID, when it had one.
    pub id: Option<i64>,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Outcome of a batch operation that continues past individual failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// IDs of the items that were applied, in submission order.
    pub succeeded: Vec<i64>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub(crate) fn record_failure(
        &mut self,
        position: usize,
        id: Option<i64>,
        err: &RetrievalError,
    ) {
        self.failed.push(BatchFailure { position, id, kind: err.kind(), reason: err.to_string() });
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
