//! LLM provider trait for prompt-in, text-out generation

use async_trait::async_trait;
use crate::error::Result;

/// Trait for free-text generation
///
/// Used for document classification, enrichment labels, query intent and
/// grounded answers. Callers own the prompt; the provider returns raw text.
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.1, phi3, etc.)
/// - `GeminiLlm`: Google Generative Language API (gemini-2.5-flash)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a fully assembled prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
