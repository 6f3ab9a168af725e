//! Configuration for the ingestion pipeline and the RAG query path

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ingestion::pdf::{PageSelection, TableFlavor};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RagConfig {
    /// Which model backend serves embeddings and generation
    #[serde(default)]
    pub backend: ModelBackend,
    /// Ollama configuration (backend = ollama)
    #[serde(default)]
    pub llm: LlmConfig,
    /// Gemini configuration (backend = gemini)
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// On-disk locations
    #[serde(default)]
    pub storage: StorageConfig,
    /// Ingestion stage configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Query-time configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file and apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: RagConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `path` when given, otherwise defaults plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let mut config = Self::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    /// Pick up credentials and endpoints from the environment
    pub fn apply_env(&mut self) {
        if self.gemini.api_key.is_none() {
            self.gemini.api_key = ["GOOGLE_API_KEY", "GEMINI_API_KEY"]
                .iter()
                .filter_map(|name| std::env::var(name).ok())
                .find(|value| !value.trim().is_empty());
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(backend) = std::env::var("FOLIO_BACKEND") {
            match backend.to_lowercase().as_str() {
                "gemini" => self.backend = ModelBackend::Gemini,
                "ollama" => self.backend = ModelBackend::Ollama,
                other => tracing::warn!("Ignoring unknown FOLIO_BACKEND '{}'", other),
            }
        }
    }
}

/// Model backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Google Generative Language API
    Gemini,
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.1".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Gemini (Generative Language API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; read from GOOGLE_API_KEY / GEMINI_API_KEY when absent
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    /// Generation model
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// Embedding model
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_generation_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_temperature() -> f32 { 0.3 }
fn default_gemini_timeout() -> u64 { 60 }
fn default_max_retries() -> u32 { 2 }

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            generation_model: default_generation_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            timeout_secs: default_gemini_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding dimensions (768 for nomic-embed-text and text-embedding-004)
    pub dimensions: usize,
    /// Chunks embedded per request batch
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 768,
            batch_size: 32,
        }
    }
}

/// On-disk locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per ingested doc_id
    pub output_root: PathBuf,
    /// SQLite file backing the vector index
    pub vector_db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let vector_db_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("folio-rag")
            .join("vectors.db");

        Self {
            output_root: PathBuf::from("ingested"),
            vector_db_path,
        }
    }
}

/// Ingestion stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Ask the generative model to classify the document type
    #[serde(default)]
    pub use_model_classifier: bool,
    /// Ask the generative model to tag sections and roles
    #[serde(default)]
    pub use_model_enrichment: bool,
    /// Table detection strategies, tried in order
    #[serde(default = "default_table_flavors")]
    pub table_flavors: Vec<TableFlavor>,
    /// Pages scanned for tables
    #[serde(default)]
    pub table_pages: PageSelection,
    /// Leading text budget sent to the model classifier
    #[serde(default = "default_sample_chars")]
    pub classifier_sample_chars: usize,
    /// Blocks per enrichment prompt
    #[serde(default = "default_enrichment_batch")]
    pub enrichment_batch_size: usize,
    /// Upper bound for a single classification/enrichment model call
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,
    /// Documents ingested concurrently by batch ingestion
    pub parallel_documents: Option<usize>,
}

fn default_table_flavors() -> Vec<TableFlavor> {
    vec![TableFlavor::StructuralLines, TableFlavor::Whitespace]
}

fn default_sample_chars() -> usize { 6000 }
fn default_enrichment_batch() -> usize { 200 }
fn default_model_timeout() -> u64 { 60 }

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            use_model_classifier: false,
            use_model_enrichment: false,
            table_flavors: default_table_flavors(),
            table_pages: PageSelection::All,
            classifier_sample_chars: default_sample_chars(),
            enrichment_batch_size: default_enrichment_batch(),
            model_timeout_secs: default_model_timeout(),
            parallel_documents: None,
        }
    }
}

impl IngestionConfig {
    /// Number of documents to ingest at once (auto-detected from CPU count)
    pub fn parallelism(&self) -> usize {
        self.parallel_documents
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// Query-time configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of chunks retrieved per question
    pub top_k: usize,
    /// Character budget for the assembled context
    pub context_char_budget: usize,
    /// Upper bound for the intent classification model call
    pub intent_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            context_char_budget: 12_000,
            intent_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.backend, ModelBackend::Ollama);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.context_char_budget, 12_000);
        assert_eq!(config.ingestion.enrichment_batch_size, 200);
        assert_eq!(
            config.ingestion.table_flavors,
            vec![TableFlavor::StructuralLines, TableFlavor::Whitespace]
        );
    }

    #[test]
    fn test_partial_toml() {
        let config: RagConfig = toml::from_str(
            r#"
            backend = "gemini"

            [ingestion]
            use_model_classifier = true
            table_flavors = ["whitespace"]
            table_pages = "1-3"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, ModelBackend::Gemini);
        assert!(config.ingestion.use_model_classifier);
        assert_eq!(config.ingestion.table_flavors, vec![TableFlavor::Whitespace]);
        assert_eq!(config.ingestion.table_pages, PageSelection::Pages(vec![1, 2, 3]));
        assert_eq!(config.gemini.generation_model, "gemini-2.5-flash");
        assert_eq!(config.retrieval.top_k, 10);
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = RagConfig::default();
        config.gemini.api_key = Some("secret".to_string());
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
