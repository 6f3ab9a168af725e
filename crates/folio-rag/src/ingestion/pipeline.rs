//! In-process ingestion pipeline
//!
//! extract → classify → checkpoint → clean → enrich → validate → save → chunk → index
//!
//! The checkpoint written after classification is the resume point: a document
//! whose later stages failed can be re-run with [`IngestPipeline::resume`].

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::Semaphore;

use crate::config::{IngestionConfig, RagConfig};
use crate::error::{Error, Result};
use crate::providers::Providers;
use crate::retrieval::VectorIndex;
use crate::types::{DocumentType, IngestedDocument, Issue};

use super::artifacts::ArtifactStore;
use super::chunker::chunk_document;
use super::classifier::DocumentClassifier;
use super::cleaner::clean_document;
use super::enrichment::{prepare_mapping_payload, SemanticEnricher};
use super::pdf::{default_doc_id, extract_images, extract_tables, parse_pdf};
use super::validator::validate_all;

/// One PDF to ingest
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub path: PathBuf,
    /// Defaults to the file stem
    pub doc_id: Option<String>,
    pub doc_type_hint: DocumentType,
    /// Overrides both model toggles from the config
    pub use_model: Option<bool>,
}

impl IngestRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            doc_id: None,
            doc_type_hint: DocumentType::Generic,
            use_model: None,
        }
    }

    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    pub fn with_doc_type(mut self, doc_type: DocumentType) -> Self {
        self.doc_type_hint = doc_type;
        self
    }

    pub fn with_model(mut self, use_model: bool) -> Self {
        self.use_model = Some(use_model);
        self
    }
}

/// Outcome of ingesting one document
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub doc_type: DocumentType,
    pub file_name: String,
    pub page_count: u32,
    pub text_blocks: usize,
    pub tables: usize,
    pub images: usize,
    pub transactions: usize,
    pub chunks_indexed: usize,
    pub issues: Vec<Issue>,
    pub artifact_dir: PathBuf,
}

/// Outcome of re-indexing every stored document
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReindexSummary {
    pub documents: usize,
    pub chunks_indexed: usize,
    /// Directories that could not be loaded
    pub skipped: Vec<String>,
}

/// Runs every stage of ingestion for one or many documents
pub struct IngestPipeline {
    config: IngestionConfig,
    store: ArtifactStore,
    classifier: DocumentClassifier,
    enricher: SemanticEnricher,
    index: VectorIndex,
}

impl IngestPipeline {
    pub fn new(config: &RagConfig, providers: &Providers) -> Self {
        Self::with_parts(
            config.ingestion.clone(),
            ArtifactStore::new(&config.storage.output_root),
            providers,
            VectorIndex::from_providers(providers, config.embeddings.batch_size),
        )
    }

    pub fn with_parts(config: IngestionConfig, store: ArtifactStore, providers: &Providers, index: VectorIndex) -> Self {
        Self {
            classifier: DocumentClassifier::new(providers.llm.clone(), &config),
            enricher: SemanticEnricher::new(providers.llm.clone(), &config),
            config,
            store,
            index,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Extract, classify and checkpoint a PDF, then run the remaining stages
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport> {
        let mut doc = self.extract(&request).await?;

        let use_classifier = request.use_model.unwrap_or(self.config.use_model_classifier);
        let doc_type = self.classifier.classify_document(&doc, use_classifier).await;
        doc.metadata.doc_type = doc_type;

        self.store.save(&doc)?;
        tracing::info!("Checkpointed {} as {}", doc.doc_id(), doc_type);

        let use_enrichment = request.use_model.unwrap_or(self.config.use_model_enrichment);
        self.process(doc, use_enrichment).await
    }

    /// Text, tables and images on a blocking thread
    async fn extract(&self, request: &IngestRequest) -> Result<IngestedDocument> {
        let path = request.path.clone();
        let doc_id = request.doc_id.clone().unwrap_or_else(|| default_doc_id(&path));
        let hint = request.doc_type_hint;
        let pages = self.config.table_pages.clone();
        let flavors = self.config.table_flavors.clone();
        let output_root = self.store.root().to_path_buf();

        tracing::info!("Extracting {} as {}", path.display(), doc_id);

        tokio::task::spawn_blocking(move || -> Result<IngestedDocument> {
            let mut doc = parse_pdf(&path, hint, Some(&doc_id))?;
            doc.tables = extract_tables(&path, &doc_id, hint, &pages, &flavors)?;
            doc.images = extract_images(&path, &doc_id, &output_root)?;
            Ok(doc)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    /// Stages after extraction: clean, enrich, validate, save, chunk, index
    pub async fn process(&self, mut doc: IngestedDocument, use_model: bool) -> Result<IngestReport> {
        clean_document(&mut doc);
        self.enricher.enrich(&mut doc, use_model).await;

        let issues = validate_all(&doc);
        if !issues.is_empty() {
            tracing::warn!("{}: {} validation issues", doc.doc_id(), issues.len());
        }
        self.store.save_validation(doc.doc_id(), &issues)?;

        let artifact_dir = self.store.save(&doc)?;
        let payload = prepare_mapping_payload(&doc);
        self.store.save_transactions(&payload)?;

        let chunks_indexed = self.index_document(&doc).await?;

        tracing::info!(
            "Ingested {} ({}): {} texts, {} tables, {} images, {} chunks",
            doc.doc_id(),
            doc.doc_type(),
            doc.texts.len(),
            doc.tables.len(),
            doc.images.len(),
            chunks_indexed
        );

        Ok(IngestReport {
            doc_id: doc.metadata.doc_id.clone(),
            doc_type: doc.metadata.doc_type,
            file_name: doc.metadata.file_name.clone(),
            page_count: doc.metadata.page_count,
            text_blocks: doc.texts.len(),
            tables: doc.tables.len(),
            images: doc.images.len(),
            transactions: payload.transactions.len(),
            chunks_indexed,
            issues,
            artifact_dir,
        })
    }

    /// Re-run the post-extraction stages from a stored checkpoint
    pub async fn resume(&self, doc_id: &str) -> Result<IngestReport> {
        let doc = self.store.load(doc_id)?;
        tracing::info!("Resuming {} from {}", doc_id, self.store.doc_dir(doc_id).display());
        self.process(doc, self.config.use_model_enrichment).await
    }

    /// Replace a document's chunks in the index
    async fn index_document(&self, doc: &IngestedDocument) -> Result<usize> {
        let chunks = chunk_document(doc);
        self.index.delete_document(doc.doc_id()).await?;
        self.index.index_chunks(&chunks).await
    }

    /// Chunk and index every stored document
    pub async fn reindex_all(&self) -> Result<ReindexSummary> {
        let mut summary = ReindexSummary::default();

        for doc_id in self.store.list()? {
            let doc = match self.store.load(&doc_id) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", doc_id, e);
                    summary.skipped.push(doc_id);
                    continue;
                }
            };
            summary.chunks_indexed += self.index_document(&doc).await?;
            summary.documents += 1;
        }

        tracing::info!(
            "Re-indexed {} documents, {} chunks ({} skipped)",
            summary.documents,
            summary.chunks_indexed,
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// Ingest several documents concurrently; results keep request order
    pub async fn ingest_batch(&self, requests: Vec<IngestRequest>) -> Vec<(PathBuf, Result<IngestReport>)> {
        let semaphore = Semaphore::new(self.config.parallelism());

        let futures = requests.into_iter().map(|request| {
            let semaphore = &semaphore;
            async move {
                let path = request.path.clone();
                let result = match semaphore.acquire().await {
                    Ok(_permit) => self.ingest(request).await,
                    Err(e) => Err(Error::Internal(format!("Semaphore closed: {}", e))),
                };
                if let Err(e) = &result {
                    tracing::error!("Failed to ingest {}: {}", path.display(), e);
                }
                (path, result)
            }
        });

        futures::future::join_all(futures).await
    }
}
