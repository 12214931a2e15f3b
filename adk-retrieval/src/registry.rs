//! Vector store backend registry.
//!
//! Backends are resolved by identifier at configuration time through factories
//! registered in a [`BackendRegistry`], so callers depend only on the
//! [`VectorStore`] capability.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RetrievalError};
use crate::inmemory::{InMemoryVectorStore, MEMORY_BACKEND};
use crate::value::Value;
use crate::vectorstore::VectorStore;

/// Selects a backend and carries its backend-specific options (address, credentials, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub backend: String,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(MEMORY_BACKEND)
    }
}

impl BackendConfig {
    pub fn new(backend: impl Into<String>) -> Self {
        Self { backend: backend.into(), options: BTreeMap::new() }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

/// Builds a vector store from its configuration.
pub type BackendFactory =
    Arc<dyn Fn(&BackendConfig) -> Result<Arc<dyn VectorStore>> + Send + Sync>;

/// Maps backend identifiers to factories.
///
/// # Example
///
/// ```rust,ignore
/// let registry = BackendRegistry::with_defaults();
/// let store = registry.create(&BackendConfig::new("memory"))?;
/// ```
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry").field("backends", &self.backends()).finish()
    }
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the in-memory backend registered as `"memory"`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(MEMORY_BACKEND, |_config: &BackendConfig| {
            Ok(Arc::new(InMemoryVectorStore::new()) as Arc<dyn VectorStore>)
        });
        registry
    }

    /// Register a factory, replacing any previous one with the same identifier.
    pub fn register<F>(&mut self, backend: impl Into<String>, factory: F)
    where
        F: Fn(&BackendConfig) -> Result<Arc<dyn VectorStore>> + Send + Sync + 'static,
    {
        self.factories.insert(backend.into(), Arc::new(factory));
    }

    /// Registered identifiers, sorted.
    pub fn backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, backend: &str) -> bool {
        self.factories.contains_key(backend)
    }

    /// Build the backend named by `config.backend`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::NotFound`] for an unregistered identifier, or
    /// whatever the factory reports.
    pub fn create(&self, config: &BackendConfig) -> Result<Arc<dyn VectorStore>> {
        let factory = self.factories.get(&config.backend).ok_or_else(|| {
            RetrievalError::NotFound { kind: "backend", name: config.backend.clone() }
        })?;
        debug!(backend = %config.backend, "creating vector store backend");
        factory(config)
    }
}
