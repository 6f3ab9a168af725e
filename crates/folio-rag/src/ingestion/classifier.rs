//! Document type classification
//!
//! Rules look at the file name first, then at a sample of leading text.
//! The model-assisted path asks the LLM for a single label and falls back
//! to the rule result on any failure; it never returns an error.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

use crate::config::IngestionConfig;
use crate::generation::PromptBuilder;
use crate::labels::{match_any_keyword, LabelRule, LabelRules};
use crate::providers::LlmProvider;
use crate::types::{DocumentType, IngestedDocument, TextBlock};

static CURRENCY_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}(,\d{3})+\.\d{2}").expect("Invalid regex"));

const FILENAME_RULES: &[(&[&str], DocumentType)] = &[
    (&["statement", "bank"], DocumentType::BankStatement),
    (&["invoice"], DocumentType::Invoice),
    (&["receipt", "slip"], DocumentType::Receipt),
    (&["purchase"], DocumentType::PurchaseOrder),
    (&["delivery"], DocumentType::DeliveryNote),
    (&["tax"], DocumentType::TaxForm),
];

const CONTENT_RULES: &[(&[&str], DocumentType)] = &[
    (&["ใบแจ้งยอด", "ยอดคงเหลือ", "account"], DocumentType::BankStatement),
    (&["tax invoice", "ใบกำกับภาษี"], DocumentType::Invoice),
    (&["received with thanks", "ใบเสร็จ"], DocumentType::Receipt),
    (&["purchase order", "ใบสั่งซื้อ"], DocumentType::PurchaseOrder),
    (&["delivery note", "ใบส่งของ", "ใบส่งสินค้า"], DocumentType::DeliveryNote),
    (&["withholding tax", "ภ.ง.ด", "หนังสือรับรองการหักภาษี"], DocumentType::TaxForm),
];

/// Free-text model answers onto document types
pub const DOCUMENT_TYPE_RULES: LabelRules<DocumentType> = LabelRules::new(&[
    LabelRule { needles: &["bank", "statement"], label: DocumentType::BankStatement },
    LabelRule { needles: &["statement"], label: DocumentType::BankStatement },
    LabelRule { needles: &["invoice"], label: DocumentType::Invoice },
    LabelRule { needles: &["receipt"], label: DocumentType::Receipt },
    LabelRule { needles: &["purchase"], label: DocumentType::PurchaseOrder },
    LabelRule { needles: &["delivery"], label: DocumentType::DeliveryNote },
    LabelRule { needles: &["tax"], label: DocumentType::TaxForm },
]);

/// Concatenate leading non-empty blocks while they fit in `max_chars`
pub fn collect_sample(texts: &[TextBlock], max_chars: usize) -> String {
    let mut parts = Vec::new();
    let mut total = 0;
    for block in texts {
        if block.content.is_empty() {
            continue;
        }
        let len = block.content.chars().count();
        if total + len > max_chars {
            break;
        }
        parts.push(block.content.as_str());
        total += len;
    }
    parts.join("\n")
}

/// `po`, `po123` and similar purchase-order tokens
fn has_po_token(file_name: &str) -> bool {
    file_name
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token.strip_prefix("po").is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit())))
}

/// Rule-based classification
pub fn classify_by_rules(doc: &IngestedDocument, sample_chars: usize) -> DocumentType {
    let file_name = doc.metadata.file_name.to_lowercase();

    if let Some(label) = match_any_keyword(&file_name, &FILENAME_RULES[..3]) {
        return label;
    }
    if has_po_token(&file_name) {
        return DocumentType::PurchaseOrder;
    }
    if let Some(label) = match_any_keyword(&file_name, &FILENAME_RULES[3..]) {
        return label;
    }

    let sample = collect_sample(&doc.texts, sample_chars).to_lowercase();
    if let Some(label) = match_any_keyword(&sample, CONTENT_RULES) {
        return label;
    }
    if CURRENCY_AMOUNT.is_match(&sample) || sample.contains("gfmis") {
        return DocumentType::BankStatement;
    }

    DocumentType::Generic
}

/// Document classifier with an optional model-assisted path
pub struct DocumentClassifier {
    llm: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
    sample_chars: usize,
}

impl DocumentClassifier {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, config: &IngestionConfig) -> Self {
        Self {
            llm,
            timeout: Duration::from_secs(config.model_timeout_secs),
            sample_chars: config.classifier_sample_chars,
        }
    }

    /// Classify a document; `use_model` enables the model-assisted path when an LLM is present
    pub async fn classify_document(&self, doc: &IngestedDocument, use_model: bool) -> DocumentType {
        let rule_label = classify_by_rules(doc, self.sample_chars);

        let llm = match (&self.llm, use_model) {
            (Some(llm), true) => llm,
            (None, true) => {
                tracing::warn!("Model classification requested but no LLM configured, using rules");
                return rule_label;
            }
            _ => return rule_label,
        };

        let sample = collect_sample(&doc.texts, self.sample_chars);
        let prompt = PromptBuilder::document_classification(&doc.metadata.file_name, &sample);

        match tokio::time::timeout(self.timeout, llm.generate(&prompt)).await {
            Ok(Ok(answer)) => match DOCUMENT_TYPE_RULES.canonicalize(&answer) {
                Some(label) => {
                    tracing::info!("Model classified {} as {} (rules: {})", doc.doc_id(), label, rule_label);
                    label
                }
                None => {
                    tracing::warn!("Unrecognized classification '{}', using rule label {}", answer.trim(), rule_label);
                    rule_label
                }
            },
            Ok(Err(e)) => {
                tracing::warn!("Model classification failed: {}, using rule label {}", e, rule_label);
                rule_label
            }
            Err(_) => {
                tracing::warn!("Model classification timed out after {:?}, using rule label {}", self.timeout, rule_label);
                rule_label
            }
        }
    }
}
