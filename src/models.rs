//! Core data models that flow through the ingestion and retrieval pipeline.
//!
//! A [`Document`] is produced by a reader, handed to the index builder, and
//! comes back out of the vector store wrapped in a [`ScoredDocument`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provenance metadata. Keys are source-kind specific; values are JSON scalars.
pub type Metadata = BTreeMap<String, Value>;

/// Uniform unit of retrievable knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Adds one metadata entry, flattening non-scalar values to their JSON text.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), to_scalar(value.into()));
        self
    }

    /// True when the text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A document returned from a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    /// Entry id assigned by the store.
    pub id: String,
    /// Cosine similarity to the query vector.
    pub score: f32,
    pub document: Document,
}

/// Result of a retrieval query: the synthesized text and the documents it was
/// grounded on, most similar first.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredDocument>,
}

/// Identity of the embedding model a collection was built with.
///
/// Recorded on the collection at creation time. The index builder and the
/// query engine both refuse to work with an embedder whose profile differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingProfile {
    pub model: String,
    pub dims: usize,
}

impl EmbeddingProfile {
    pub fn new(model: impl Into<String>, dims: usize) -> Self {
        Self {
            model: model.into(),
            dims,
        }
    }

    /// A profile with no dimensions (the disabled embedder) can never hold vectors.
    pub fn is_usable(&self) -> bool {
        self.dims > 0
    }
}

impl fmt::Display for EmbeddingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} dims)", self.model, self.dims)
    }
}

/// Collapses arrays and objects into their compact JSON text so metadata
/// stays scalar.
pub fn to_scalar(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar,
    }
}

/// Infers a JSON scalar from a textual cell: integers, then floats, then booleans,
/// falling back to the string itself.
pub fn infer_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match trimmed {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
