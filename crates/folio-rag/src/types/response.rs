//! Query response types

use serde::{Deserialize, Serialize};

use super::chunk::ScalarMap;
use super::query::{Intent, QueryMode};

/// One citation per retrieved item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub doc_id: Option<String>,
    pub page: Option<u32>,
    pub source: Option<String>,
    pub chunk_id: Option<String>,
}

impl SourceRef {
    pub fn from_metadata(metadata: &ScalarMap) -> Self {
        let text = |key: &str| metadata.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Self {
            doc_id: text("doc_id"),
            page: metadata.get("page").and_then(|v| v.as_u32()),
            source: text("source"),
            chunk_id: text("chunk_id"),
        }
    }
}

/// Grounded answer with citations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub intent: Intent,
    pub mode: QueryMode,
}
