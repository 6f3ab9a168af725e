//! Gemini client for generation and embeddings via the Generative Language API
//!
//! Authenticates with an API key header; every request goes through the
//! shared exponential-backoff retry.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GeminiConfig;
use crate::error::{Error, Result};
use crate::generation::retry_request;

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

/// Maximum requests accepted by one batchEmbedContents call
const MAX_EMBED_BATCH: usize = 100;

/// Gemini REST client
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Clone)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Clone)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Clone)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().map(|p| p.text).collect();
        Some(text)
    }
}

impl GeminiClient {
    /// Create a client; fails when no API key is configured
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("Gemini API key not set (GOOGLE_API_KEY or GEMINI_API_KEY)".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    fn user_content(text: &str) -> Content {
        Content {
            role: Some("user".to_string()),
            parts: vec![Part { text: text.to_string() }],
        }
    }

    fn embed_request(&self, text: &str) -> EmbedRequest {
        EmbedRequest {
            model: format!("models/{}", self.config.embedding_model),
            content: Content {
                role: None,
                parts: vec![Part { text: text.to_string() }],
            },
        }
    }

    /// Generate text for a prompt
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint(&self.config.generation_model, "generateContent");
        let contents = vec![Self::user_content(prompt)];
        let temperature = self.config.temperature;

        tracing::debug!(
            "Generating with Gemini model: {} ({} prompt chars)",
            self.config.generation_model,
            prompt.len()
        );

        retry_request(self.config.max_retries, || {
            let request = GenerateRequest {
                contents: contents.clone(),
                generation_config: GenerationConfig { temperature },
            };
            let builder = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request);

            async move {
                let response = builder
                    .send()
                    .await
                    .map_err(|e| Error::Llm(format!("Gemini request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::Llm(format!(
                        "Gemini generation failed ({}): {}",
                        status, body
                    )));
                }

                let gen_response: GenerateResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Llm(format!("Failed to parse Gemini response: {}", e)))?;

                gen_response
                    .text()
                    .ok_or_else(|| Error::Llm("No text in Gemini response".to_string()))
            }
        })
        .await
    }

    /// Embed a single text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.endpoint(&self.config.embedding_model, "embedContent");
        let request = self.embed_request(text);

        retry_request(self.config.max_retries, || {
            let builder = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request);

            async move {
                let response = builder
                    .send()
                    .await
                    .map_err(|e| Error::Embedding(format!("Gemini embedding request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::Embedding(format!(
                        "Gemini embedding failed ({}): {}",
                        status, body
                    )));
                }

                let embed_response: EmbedResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::Embedding(format!("Failed to parse embedding response: {}", e)))?;

                Ok(embed_response.embedding.values)
            }
        })
        .await
    }

    /// Embed many texts, at most 100 per request
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint(&self.config.embedding_model, "batchEmbedContents");
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_EMBED_BATCH) {
            let requests: Vec<EmbedRequest> = batch.iter().map(|t| self.embed_request(t)).collect();
            let expected = requests.len();
            let body = BatchEmbedRequest { requests };

            let embeddings = retry_request(self.config.max_retries, || {
                let builder = self
                    .client
                    .post(&url)
                    .header("x-goog-api-key", &self.api_key)
                    .json(&body);

                async move {
                    let response = builder
                        .send()
                        .await
                        .map_err(|e| Error::Embedding(format!("Gemini batch embedding request failed: {}", e)))?;

                    if !response.status().is_success() {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::Embedding(format!(
                            "Gemini batch embedding failed ({}): {}",
                            status, body
                        )));
                    }

                    let batch_response: BatchEmbedResponse = response.json().await.map_err(|e| {
                        Error::Embedding(format!("Failed to parse batch embedding response: {}", e))
                    })?;

                    Ok(batch_response.embeddings)
                }
            })
            .await?;

            if embeddings.len() != expected {
                return Err(Error::Embedding(format!(
                    "Gemini returned {} embeddings for {} texts",
                    embeddings.len(),
                    expected
                )));
            }
            all_embeddings.extend(embeddings.into_iter().map(|e| e.values));
        }

        Ok(all_embeddings)
    }

    /// Check the API key against the model listing endpoint
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/v1beta/models", self.config.base_url.trim_end_matches('/'));
        match self.client.get(&url).header("x-goog-api-key", &self.api_key).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// Gemini embedding provider (text-embedding-004)
pub struct GeminiEmbedder {
    client: Arc<GeminiClient>,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(client: Arc<GeminiClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Gemini LLM provider
pub struct GeminiLlm {
    client: Arc<GeminiClient>,
}

impl GeminiLlm {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LlmProvider for GeminiLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.client.config().generation_model
    }
}
