//! Core types for the ingestion pipeline and the query path

pub mod chunk;
pub mod document;
pub mod extra;
pub mod query;
pub mod response;
pub mod validation;

pub use chunk::{Chunk, Scalar, ScalarMap, SourceKind};
pub use document::{
    block_id, BBox, DocumentMetadata, DocumentType, ImageBlock, IngestedDocument, SectionLabel, TableBlock,
    TableCategory, TableRole, TextBlock, TextRole,
};
pub use extra::{Extra, ExtraValue, Stage};
pub use query::{Intent, QueryMode, QueryRequest};
pub use response::{QueryResponse, SourceRef};
pub use validation::{Issue, IssueCode, IssueLevel};
