//! folio-rag: PDF ingestion-to-RAG pipeline
//!
//! Extracts text blocks, tables and images from PDFs with positional provenance,
//! classifies and enriches them, indexes retrievable chunks in a SQLite vector
//! store and answers questions grounded in the retrieved evidence.
//!
//! Model-assisted stages (classification, enrichment, query intent) always have
//! a rule-based path and degrade to it when the model is absent or failing.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod labels;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{ArtifactStore, IngestPipeline, IngestReport, IngestRequest};
pub use providers::Providers;
pub use retrieval::{RagOrchestrator, VectorIndex};
pub use types::{
    Chunk, DocumentType, ImageBlock, IngestedDocument, Intent, QueryMode, QueryRequest, QueryResponse,
    TableBlock, TextBlock,
};
