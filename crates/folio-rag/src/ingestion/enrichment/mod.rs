//! Semantic enrichment: sections, text roles, table headers and transactions
//!
//! Section and role tagging run rules by default. With a model enabled, blocks
//! are sent in batches and the model's `index: label` answers override the
//! rules block by block; any block the model skips keeps its rule label, and a
//! failed batch falls back to rules for that batch only.

pub mod sections;
pub mod tables;
pub mod transactions;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::IngestionConfig;
use crate::generation::{parse_index_labels, PromptBuilder};
use crate::labels::Label;
use crate::providers::LlmProvider;
use crate::types::{IngestedDocument, SectionLabel, Stage, TextBlock, TextRole};

pub use sections::{guess_role, guess_section};
pub use tables::{guess_table_role, normalize_header, normalize_tables};
pub use transactions::{
    annotate_transaction_counts, extract_transactions, parse_amount, prepare_mapping_payload, MappingPayload,
    TransactionRecord,
};

/// Where a label came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Rule,
    Model,
}

impl Strategy {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Model => "model",
        }
    }
}

/// Enricher with an optional model-assisted path
pub struct SemanticEnricher {
    llm: Option<Arc<dyn LlmProvider>>,
    batch_size: usize,
    timeout: Duration,
}

impl SemanticEnricher {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, config: &IngestionConfig) -> Self {
        Self {
            llm,
            batch_size: config.enrichment_batch_size.max(1),
            timeout: Duration::from_secs(config.model_timeout_secs),
        }
    }

    /// Run every enrichment step over a document in place
    pub async fn enrich(&self, doc: &mut IngestedDocument, use_model: bool) {
        self.tag_sections(doc, use_model).await;
        self.tag_roles(doc, use_model).await;
        normalize_tables(&mut doc.tables);
        annotate_transaction_counts(&mut doc.tables);

        tracing::info!(
            "Enriched {}: {} text blocks, {} tables",
            doc.doc_id(),
            doc.texts.len(),
            doc.tables.len()
        );
    }

    fn active_llm(&self, use_model: bool) -> Option<&Arc<dyn LlmProvider>> {
        if !use_model {
            return None;
        }
        if self.llm.is_none() {
            tracing::warn!("Model enrichment requested but no LLM configured, using rules");
        }
        self.llm.as_ref()
    }

    /// Assign every text block one section label
    pub async fn tag_sections(&self, doc: &mut IngestedDocument, use_model: bool) {
        let model_labels = match self.active_llm(use_model) {
            Some(llm) => {
                self.label_blocks(llm.as_ref(), &doc.texts, SectionLabel::Other, "section", |offset, batch| {
                    PromptBuilder::section_batch(offset, batch.iter().map(|b| b.content.as_str()))
                })
                .await
            }
            None => vec![None; doc.texts.len()],
        };

        for (position, (block, model_label)) in doc.texts.iter_mut().zip(model_labels).enumerate() {
            let (label, strategy) = match model_label {
                Some(label) => (label, Strategy::Model),
                None => (guess_section(block, position), Strategy::Rule),
            };
            block.section = Some(label);
            block.extra.set(Stage::Section, "label", label.as_str());
            block.extra.set(Stage::Section, "strategy", strategy.as_str());
        }
    }

    /// Assign every text block one role; expects sections to be tagged
    pub async fn tag_roles(&self, doc: &mut IngestedDocument, use_model: bool) {
        let model_labels = match self.active_llm(use_model) {
            Some(llm) => {
                self.label_blocks(llm.as_ref(), &doc.texts, TextRole::Other, "role", |offset, batch| {
                    PromptBuilder::role_batch(
                        offset,
                        batch.iter().map(|b| {
                            let section = b.section.map(|s| s.as_str()).unwrap_or("unknown");
                            (section, b.content.as_str())
                        }),
                    )
                })
                .await
            }
            None => vec![None; doc.texts.len()],
        };

        for (block, model_label) in doc.texts.iter_mut().zip(model_labels) {
            let (label, strategy) = match model_label {
                Some(label) => (label, Strategy::Model),
                None => (guess_role(block), Strategy::Rule),
            };
            block.role = Some(label);
            block.extra.set(Stage::Role, "label", label.as_str());
            block.extra.set(Stage::Role, "strategy", strategy.as_str());
        }
    }

    /// Per-block model labels; `None` where the model gave no usable answer
    async fn label_blocks<L, F>(
        &self,
        llm: &dyn LlmProvider,
        texts: &[TextBlock],
        unknown: L,
        task: &str,
        prompt_for: F,
    ) -> Vec<Option<L>>
    where
        L: Label,
        F: Fn(usize, &[TextBlock]) -> String,
    {
        let mut labels = vec![None; texts.len()];

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            let prompt = prompt_for(offset, batch);

            let response = match tokio::time::timeout(self.timeout, llm.generate(&prompt)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    tracing::warn!("Model {} tagging failed for blocks {}..{}: {}, using rules", task, offset, offset + batch.len(), e);
                    continue;
                }
                Err(_) => {
                    tracing::warn!("Model {} tagging timed out for blocks {}..{}, using rules", task, offset, offset + batch.len());
                    continue;
                }
            };

            let parsed: BTreeMap<usize, String> = parse_index_labels(&response).into_iter().collect();
            let mut applied = 0;
            for index in offset..offset + batch.len() {
                if let Some(raw) = parsed.get(&index) {
                    labels[index] = Some(L::parse_exact(raw).unwrap_or(unknown));
                    applied += 1;
                }
            }
            tracing::debug!("Model {} tagging labelled {}/{} blocks", task, applied, batch.len());
        }

        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::providers::llm::MockLlmProvider;
    use crate::types::{DocumentMetadata, DocumentType, TableBlock, TableRole};

    fn doc(texts: &[&str]) -> IngestedDocument {
        let mut doc = IngestedDocument::new(DocumentMetadata::new("doc_001", "stmt.pdf", DocumentType::BankStatement, 2));
        doc.texts = texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextBlock::new(format!("txt_{:04}", i + 1), "doc_001", 2, *t))
            .collect();
        doc
    }

    fn config(batch: usize) -> IngestionConfig {
        IngestionConfig {
            enrichment_batch_size: batch,
            ..IngestionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_rules_only() {
        let enricher = SemanticEnricher::new(None, &config(200));
        let mut d = doc(&["Account Summary", "รายการเดินบัญชี ประจำเดือน", "ลงชื่อ"]);
        enricher.enrich(&mut d, false).await;

        assert_eq!(d.texts[0].section, Some(SectionLabel::Summary));
        assert_eq!(d.texts[1].section, Some(SectionLabel::Transactions));
        assert_eq!(d.texts[1].role, Some(TextRole::TransactionRow));
        assert_eq!(d.texts[2].role, Some(TextRole::FooterText));
        assert_eq!(
            d.texts[0].extra.get(Stage::Section, "strategy").and_then(|v| v.as_str()),
            Some("rule")
        );
    }

    #[tokio::test]
    async fn test_partial_model_answer_keeps_rules_for_missing_indices() {
        let mut llm = MockLlmProvider::new();
        llm.expect_generate()
            .times(1)
            .returning(|_| Ok("0: footer\n2: nonsense".to_string()));

        let enricher = SemanticEnricher::new(Some(Arc::new(llm)), &config(200));
        let mut d = doc(&["Account Summary", "Overview of fees", "Thank you"]);
        enricher.tag_sections(&mut d, true).await;

        assert_eq!(d.texts[0].section, Some(SectionLabel::Footer));
        assert_eq!(d.texts[1].section, Some(SectionLabel::Summary));
        assert_eq!(d.texts[2].section, Some(SectionLabel::Other));
        assert_eq!(
            d.texts[1].extra.get(Stage::Section, "strategy").and_then(|v| v.as_str()),
            Some("rule")
        );
        assert_eq!(
            d.texts[2].extra.get(Stage::Section, "strategy").and_then(|v| v.as_str()),
            Some("model")
        );
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_per_batch() {
        let mut llm = MockLlmProvider::new();
        let mut seq = mockall::Sequence::new();
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("[0]: header\n[1]: header".to_string()));
        llm.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(Error::llm("quota exceeded")));

        let enricher = SemanticEnricher::new(Some(Arc::new(llm)), &config(2));
        let mut d = doc(&["a", "b", "Account Summary"]);
        enricher.tag_sections(&mut d, true).await;

        assert_eq!(d.texts[0].section, Some(SectionLabel::Header));
        assert_eq!(d.texts[1].section, Some(SectionLabel::Header));
        assert_eq!(d.texts[2].section, Some(SectionLabel::Summary));
    }

    #[tokio::test]
    async fn test_role_prompt_carries_section() {
        let mut llm = MockLlmProvider::new();
        llm.expect_generate()
            .withf(|prompt| prompt.contains("[0] (section=summary) Account Summary"))
            .times(1)
            .returning(|_| Ok("0: title".to_string()));

        let enricher = SemanticEnricher::new(Some(Arc::new(llm)), &config(200));
        let mut d = doc(&["Account Summary"]);
        enricher.tag_sections(&mut d, false).await;
        enricher.tag_roles(&mut d, true).await;
        assert_eq!(d.texts[0].role, Some(TextRole::Title));
    }

    #[tokio::test]
    async fn test_enrich_normalizes_tables() {
        let enricher = SemanticEnricher::new(None, &config(200));
        let mut d = doc(&["x"]);
        d.tables.push(TableBlock::new(
            "tbl_0001",
            "doc_001",
            1,
            vec!["Date".into(), "Description".into(), "Debit".into(), "Balance".into()],
            vec![vec!["01/01".into(), "ATM".into(), "100.00".into(), "900.00".into()]],
        ));
        enricher.enrich(&mut d, false).await;

        assert_eq!(d.tables[0].columns, vec!["date", "description", "amount_out", "balance"]);
        assert_eq!(d.tables[0].role, Some(TableRole::TransactionTable));
        assert_eq!(
            d.tables[0].extra.get(Stage::Transactions, "row_count").and_then(|v| v.as_i64()),
            Some(1)
        );
    }
}
