//! Retrieval units derived from ingested blocks

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::document::DocumentType;
use crate::labels::impl_label;

/// Origin type of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Text,
    Table,
    Image,
}

impl_label!(SourceKind {
    Text => "text",
    Table => "table",
    Image => "image",
});

/// A read-only retrieval unit, consumed once by the vector index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// `{doc_id}::{source_kind}::{block_id}`
    pub id: String,
    pub doc_id: String,
    pub doc_type: DocumentType,
    pub source_kind: SourceKind,
    pub page: u32,
    pub content: String,
    /// Provenance; may hold lists, flattened to scalars by the index
    pub metadata: BTreeMap<String, Value>,
}

impl Chunk {
    pub fn compose_id(doc_id: &str, source_kind: SourceKind, block_id: &str) -> String {
        format!("{}::{}::{}", doc_id, source_kind, block_id)
    }
}

/// Scalar metadata value accepted by the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Scalars pass through; arrays and objects are stringified as JSON
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Int(i) => u32::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Rendering used in prompt headers
    pub fn render(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Flattened scalar metadata as stored in the index
pub type ScalarMap = BTreeMap<String, Scalar>;
