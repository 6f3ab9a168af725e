//! Retrieval-augmented answering: intent, filtered retrieval, grounded generation

use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{LlmProvider, Providers, SearchHit};
use crate::types::{Intent, QueryRequest, QueryResponse, ScalarMap, SourceRef};

use super::intent::IntentClassifier;
use super::search::VectorIndex;

/// Answer returned when retrieval finds nothing
pub const NO_RESULTS_ANSWER: &str = "ไม่พบข้อมูลที่เกี่ยวข้องเพียงพอในฐานข้อมูลเอกสาร";

/// Query entry point over a shared vector index
pub struct RagOrchestrator {
    index: VectorIndex,
    intent: IntentClassifier,
    llm: Option<Arc<dyn LlmProvider>>,
    config: RetrievalConfig,
}

impl RagOrchestrator {
    pub fn new(index: VectorIndex, llm: Option<Arc<dyn LlmProvider>>, config: RetrievalConfig) -> Self {
        let intent = IntentClassifier::new(llm.clone(), Duration::from_secs(config.intent_timeout_secs));
        Self {
            index,
            intent,
            llm,
            config,
        }
    }

    pub fn from_providers(providers: &Providers, batch_size: usize, config: RetrievalConfig) -> Self {
        Self::new(
            VectorIndex::from_providers(providers, batch_size),
            providers.llm.clone(),
            config,
        )
    }

    /// Answer a question from indexed documents
    ///
    /// Retrieval and generation failures are returned to the caller.
    pub async fn answer(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let intent = self.intent.resolve(&request.question, request.mode).await;
        let sources = intent.sources();
        let top_k = request.top_k.unwrap_or(self.config.top_k).max(1);

        tracing::info!(
            "Query intent={} mode={:?} top_k={} doc_ids={:?}",
            intent,
            request.mode,
            top_k,
            request.doc_ids
        );

        let hits = self
            .index
            .search_similar(&request.question, top_k, request.doc_ids.as_deref(), Some(sources.as_slice()))
            .await?;

        if hits.is_empty() {
            tracing::info!("No context found, skipping generation");
            return Ok(QueryResponse {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
                intent,
                mode: request.mode,
            });
        }

        let context = build_context(&hits, self.config.context_char_budget);
        let answer = self.generate(&request.question, &context, intent, request).await?;

        Ok(QueryResponse {
            answer,
            sources: hits.iter().map(|hit| SourceRef::from_metadata(&hit.metadata)).collect(),
            intent,
            mode: request.mode,
        })
    }

    async fn generate(&self, question: &str, context: &str, intent: Intent, request: &QueryRequest) -> Result<String> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| Error::llm("No generative model configured"))?;

        let prompt = PromptBuilder::grounded_answer(question, context, intent.name(), request.mode);
        let answer = llm.generate(&prompt).await?;
        tracing::debug!("Generated {} chars with {}", answer.chars().count(), llm.model());
        Ok(answer)
    }
}

fn field(metadata: &ScalarMap, key: &str) -> String {
    metadata
        .get(key)
        .map(|v| v.render())
        .unwrap_or_else(|| "-".to_string())
}

/// Ranked hits with provenance headers, cut to `budget` characters
pub fn build_context(hits: &[SearchHit], budget: usize) -> String {
    let context = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] (doc_id={}, page={}, source={}, doc_type={})\n{}",
                i + 1,
                field(&hit.metadata, "doc_id"),
                field(&hit.metadata, "page"),
                field(&hit.metadata, "source"),
                field(&hit.metadata, "doc_type"),
                hit.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    if context.chars().count() > budget {
        context.chars().take(budget).collect()
    } else {
        context
    }
}
