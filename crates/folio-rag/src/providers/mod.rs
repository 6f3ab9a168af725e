//! Provider abstractions for embeddings, LLM and vector storage
//!
//! This module provides trait-based abstractions that allow switching between
//! a local Ollama server and the Gemini API, and lets tests substitute mocks.

pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

use std::sync::Arc;

use crate::config::{ModelBackend, RagConfig};
use crate::error::Result;
use crate::generation::OllamaClient;

pub use embedding::EmbeddingProvider;
pub use gemini::{GeminiClient, GeminiEmbedder, GeminiLlm};
pub use llm::LlmProvider;
pub use local::LocalVectorStore;
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use vector_store::{MetadataFilter, SearchHit, VectorRecord, VectorStoreProvider};

/// Capabilities created once by the host and handed to each component
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// `None` makes model-assisted stages use rules; `from_config` always sets it
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub vector_store: Arc<dyn VectorStoreProvider>,
}

impl Providers {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            embedder,
            llm,
            vector_store,
        }
    }

    /// Build providers for the configured backend
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let vector_store: Arc<dyn VectorStoreProvider> = Arc::new(LocalVectorStore::from_config(config)?);
        let dimensions = config.embeddings.dimensions;

        let (embedder, llm): (Arc<dyn EmbeddingProvider>, Option<Arc<dyn LlmProvider>>) = match config.backend {
            ModelBackend::Ollama => {
                let client = Arc::new(OllamaClient::new(&config.llm)?);
                (
                    Arc::new(OllamaEmbedder::from_client(Arc::clone(&client), dimensions)),
                    Some(Arc::new(OllamaLlm::from_client(client)) as Arc<dyn LlmProvider>),
                )
            }
            ModelBackend::Gemini => {
                // Missing API key is a config error
                let client = Arc::new(GeminiClient::new(&config.gemini)?);
                (
                    Arc::new(GeminiEmbedder::new(Arc::clone(&client), dimensions)),
                    Some(Arc::new(GeminiLlm::new(client)) as Arc<dyn LlmProvider>),
                )
            }
        };

        tracing::info!(
            "Providers ready: embedder={}, llm={}, vector_store={}",
            embedder.name(),
            llm.as_ref().map(|l| l.model().to_string()).unwrap_or_else(|| "none".to_string()),
            vector_store.name()
        );

        Ok(Self {
            embedder,
            llm,
            vector_store,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    fn config(dir: &TempDir, backend: ModelBackend) -> RagConfig {
        let mut config = RagConfig::default();
        config.backend = backend;
        config.storage.vector_db_path = dir.path().join("vectors.db");
        config.storage.output_root = dir.path().join("ingested");
        config
    }

    #[test]
    fn test_ollama_backend_always_has_llm() {
        let dir = TempDir::new().unwrap();
        let providers = Providers::from_config(&config(&dir, ModelBackend::Ollama)).unwrap();
        assert_eq!(providers.embedder.name(), "ollama");
        assert!(providers.llm.is_some());
    }

    #[test]
    fn test_gemini_without_key_fails() {
        let dir = TempDir::new().unwrap();
        let result = Providers::from_config(&config(&dir, ModelBackend::Gemini));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
