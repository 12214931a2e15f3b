//! Collection schemas, distance metrics, and index hints.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, RetrievalError};
use crate::value::{Record, Value};

/// Declared type of a collection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int64,
    Float,
    VarChar,
    FloatVector,
    Json,
}

impl DataType {
    /// Whether `value` can be stored in a field of this type.
    ///
    /// Vector dimensions are checked separately against the field schema.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Int64 => matches!(value, Value::Int(_)),
            Self::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            Self::VarChar => matches!(value, Value::Str(_)),
            Self::FloatVector => matches!(value, Value::Vector(_)),
            Self::Json => true,
        }
    }
}

/// One field of a [`CollectionSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    /// Vector dimension; only meaningful for [`DataType::FloatVector`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub is_primary_key: bool,
    /// When set on the primary key, the store assigns IDs and records must omit the field.
    #[serde(default)]
    pub auto_id: bool,
}

impl FieldSchema {
    /// An `Int64` primary key.
    pub fn primary_key(name: impl Into<String>, auto_id: bool) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Int64,
            dimension: None,
            is_primary_key: true,
            auto_id,
        }
    }

    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            dimension: None,
            is_primary_key: false,
            auto_id: false,
        }
    }

    pub fn vector(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::FloatVector,
            dimension: Some(dimension),
            is_primary_key: false,
            auto_id: false,
        }
    }

    pub fn is_vector(&self) -> bool {
        self.data_type == DataType::FloatVector
    }
}

/// Field layout of a collection, fixed for the collection's lifetime.
///
/// # Example
///
/// ```rust,ignore
/// let schema = CollectionSchema::new()
///     .with_field(FieldSchema::primary_key("id", false))
///     .with_field(FieldSchema::scalar("text", DataType::VarChar))
///     .with_field(FieldSchema::vector("embedding", 384));
/// schema.validate()?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub description: String,
}

impl CollectionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The primary-key field. Only `None` for a schema that fails [`validate`](Self::validate).
    pub fn primary_key(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary_key)
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.is_vector())
    }

    /// Check the schema is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidArgument`] if a field name is empty or
    /// repeated, there is not exactly one `Int64` primary key, `auto_id` is set
    /// on a non-key field, or a vector field lacks a positive dimension.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(invalid("schema has no fields"));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(invalid("field names must not be empty"));
            }
            if !names.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field '{}'", field.name)));
            }
            if field.auto_id && !field.is_primary_key {
                return Err(invalid(format!("auto_id set on non-key field '{}'", field.name)));
            }
            if field.is_vector() && field.dimension.unwrap_or(0) == 0 {
                return Err(invalid(format!(
                    "vector field '{}' needs a dimension greater than zero",
                    field.name
                )));
            }
        }

        let keys: Vec<&FieldSchema> = self.fields.iter().filter(|f| f.is_primary_key).collect();
        match keys.as_slice() {
            [key] if key.data_type == DataType::Int64 => Ok(()),
            [key] => Err(invalid(format!("primary key '{}' must be int64", key.name))),
            [] => Err(invalid("schema has no primary key")),
            _ => Err(invalid(format!("schema has {} primary keys, expected one", keys.len()))),
        }
    }

    /// Check a record's declared fields against this schema.
    ///
    /// The primary key is not checked here since its presence depends on
    /// `auto_id`. Fields not declared in the schema are kept as dynamic fields.
    pub fn validate_record(&self, record: &Record) -> Result<()> {
        for field in self.fields.iter().filter(|f| !f.is_primary_key) {
            let Some(value) = record.get(&field.name) else {
                continue;
            };
            if !field.data_type.accepts(value) {
                return Err(invalid(format!(
                    "field '{}' expects {:?}, got {}",
                    field.name,
                    field.data_type,
                    value.type_name()
                )));
            }
            if let (Some(expected), Value::Vector(vector)) = (field.dimension, value) {
                if vector.len() != expected {
                    return Err(dimension_mismatch(&field.name, expected, vector.len()));
                }
                check_finite(&field.name, vector)?;
            }
        }

        let has_vector_fields = self.vector_fields().next().is_some();
        if has_vector_fields && !self.vector_fields().any(|f| record.vector(&f.name).is_some()) {
            return Err(invalid("record carries no vector field"));
        }
        Ok(())
    }
}

pub(crate) fn dimension_mismatch(field: &str, expected: usize, actual: usize) -> RetrievalError {
    invalid(format!("dimension mismatch on '{field}': expected {expected}, got {actual}"))
}

/// Rejects NaN and infinite components, which have no place in a distance ordering.
pub(crate) fn check_finite(field: &str, vector: &[f32]) -> Result<()> {
    match vector.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(invalid(format!("vector '{field}' has a non-finite value at index {i}"))),
        None => Ok(()),
    }
}

fn invalid(message: impl Into<String>) -> RetrievalError {
    RetrievalError::InvalidArgument(message.into())
}

/// Distance metric used by dense search.
///
/// Every metric is reported so that smaller is closer: `L2` is Euclidean
/// distance, `Ip` is the negated inner product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    #[default]
    L2,
    #[serde(rename = "IP")]
    Ip,
}

impl MetricType {
    /// Parse a metric name, falling back to `L2` for unknown names.
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(metric = name, "unknown metric, falling back to L2");
            Self::L2
        })
    }

    /// Distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            Self::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = f64::from(*x) - f64::from(*y);
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
            Self::Ip => -a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum::<f64>(),
        }
    }
}

impl FromStr for MetricType {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Self::L2),
            "ip" | "inner_product" | "dot" => Ok(Self::Ip),
            other => Err(invalid(format!("unsupported metric '{other}'"))),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L2 => f.write_str("L2"),
            Self::Ip => f.write_str("IP"),
        }
    }
}

/// Index structure requested from a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    Flat,
    IvfFlat,
    Hnsw,
    #[default]
    AutoIndex,
}

impl FromStr for IndexType {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FLAT" => Ok(Self::Flat),
            "IVF_FLAT" => Ok(Self::IvfFlat),
            "HNSW" => Ok(Self::Hnsw),
            "AUTOINDEX" | "AUTO_INDEX" => Ok(Self::AutoIndex),
            other => Err(invalid(format!("unsupported index type '{other}'"))),
        }
    }
}

/// Parameters for [`VectorStore::create_index`](crate::VectorStore::create_index).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexParams {
    pub index_type: IndexType,
    pub metric: MetricType,
    /// Backend-specific build parameters such as `M` or `nlist`.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl IndexParams {
    pub fn new(index_type: IndexType, metric: MetricType) -> Self {
        Self { index_type, metric, params: BTreeMap::new() }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}
