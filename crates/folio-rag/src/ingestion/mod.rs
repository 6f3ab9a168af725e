//! Document ingestion: PDF extraction through chunking, plus the pipeline that drives it

pub mod artifacts;
pub mod chunker;
pub mod classifier;
pub mod cleaner;
pub mod enrichment;
pub mod pdf;
pub mod pipeline;
pub mod validator;

pub use artifacts::ArtifactStore;
pub use chunker::chunk_document;
pub use classifier::{classify_by_rules, DocumentClassifier};
pub use cleaner::clean_document;
pub use enrichment::SemanticEnricher;
pub use pipeline::{IngestPipeline, IngestReport, IngestRequest, ReindexSummary};
pub use validator::validate_all;
