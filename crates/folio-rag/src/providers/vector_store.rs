//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Scalar, ScalarMap};

/// One embedded chunk ready for upsert
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Chunk id, the upsert key
    pub id: String,
    pub content: String,
    /// Flattened scalar metadata
    pub metadata: ScalarMap,
    pub embedding: Vec<f32>,
}

/// Structured predicate over record metadata
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    /// `metadata[key]` equals one of `values`
    In { key: String, values: Vec<String> },
    /// All inner predicates hold
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn is_in(key: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::In {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluate against a metadata map
    pub fn matches(&self, metadata: &ScalarMap) -> bool {
        match self {
            Self::In { key, values } => match metadata.get(key) {
                Some(Scalar::Null) | None => false,
                Some(value) => values.iter().any(|v| *v == value.render()),
            },
            Self::And(filters) => filters.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// Search result from vector store
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: ScalarMap,
    /// Cosine similarity, higher is more similar
    pub score: f32,
}

/// Trait for vector storage and similarity search
///
/// Upserts are keyed by record id: writing an id that already exists
/// replaces its vector, content and metadata.
///
/// Implementations:
/// - `LocalVectorStore`: SQLite-backed store (rusqlite)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert or replace records
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// Nearest neighbours of `embedding`, optionally filtered
    async fn query(&self, embedding: &[f32], k: usize, filter: Option<MetadataFilter>) -> Result<Vec<SearchHit>>;

    /// Delete all records for a document
    async fn delete_by_document(&self, doc_id: &str) -> Result<usize>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
