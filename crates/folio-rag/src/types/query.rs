//! Query request types

use serde::{Deserialize, Deserializer, Serialize};

use super::chunk::SourceKind;
use crate::labels::{impl_label, Label};

/// How the caller wants retrieval routed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Auto,
    Text,
    Table,
    Both,
}

impl QueryMode {
    /// Parse a caller-supplied mode; anything unrecognized is treated as `auto`
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "text" => Self::Text,
            "table" => Self::Table,
            "both" => Self::Both,
            _ => Self::Auto,
        }
    }

    /// The intent an explicit mode forces, if any
    pub fn forced_intent(&self) -> Option<Intent> {
        match self {
            Self::Auto => None,
            Self::Text => Some(Intent::Text),
            Self::Table => Some(Intent::Table),
            Self::Both => Some(Intent::Both),
        }
    }
}

fn lenient_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QueryMode, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|m| QueryMode::parse_lenient(&m)).unwrap_or_default())
}

/// Resolved retrieval routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Text,
    Table,
    Both,
}

impl_label!(Intent {
    Text => "text",
    Table => "table",
    Both => "both",
});

impl Intent {
    /// Chunk sources eligible for retrieval
    pub fn sources(&self) -> Vec<SourceKind> {
        match self {
            Self::Text => vec![SourceKind::Text],
            Self::Table => vec![SourceKind::Table],
            Self::Both => vec![SourceKind::Text, SourceKind::Table],
        }
    }

    pub fn name(&self) -> &'static str {
        self.as_str()
    }
}

/// Question routed through the RAG entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Restrict retrieval to these documents
    #[serde(default)]
    pub doc_ids: Option<Vec<String>>,
    /// Number of chunks to retrieve (default from config)
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default, deserialize_with = "lenient_mode")]
    pub mode: QueryMode,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            doc_ids: None,
            top_k: None,
            mode: QueryMode::Auto,
        }
    }

    pub fn with_doc_ids(mut self, doc_ids: Vec<String>) -> Self {
        self.doc_ids = Some(doc_ids);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }
}
