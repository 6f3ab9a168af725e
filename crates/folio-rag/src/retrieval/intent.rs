//! Query intent: which chunk sources a question should be answered from

use std::sync::Arc;
use std::time::Duration;

use crate::generation::PromptBuilder;
use crate::labels::{LabelRule, LabelRules};
use crate::providers::LlmProvider;
use crate::types::{Intent, QueryMode};

/// Words pointing at tabular data
pub const TABLE_KEYWORDS: &[&str] = &[
    "ตาราง",
    "table",
    "รายการ",
    "รายชื่อ",
    "สรุปข้อมูล",
    "สรุปผล",
    "สถิติ",
    "สรุปคะแนน",
    "แถวที่",
    "คอลัมน์",
    "column",
    "row",
    "ชีท",
    "sheet",
];

/// Words pointing at figures and pictures
pub const IMAGE_KEYWORDS: &[&str] = &[
    "รูป",
    "รูปภาพ",
    "image",
    "logo",
    "โลโก้",
    "กราฟ",
    "graph",
    "chart",
    "แผนภาพ",
    "diagram",
    "แผนภูมิ",
];

/// Keyword routing; `None` when the query is empty
///
/// Image queries resolve to `both`; there is no image-only retrieval path.
pub fn detect_intent_rule(query: &str) -> Option<Intent> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }

    let has_table = TABLE_KEYWORDS.iter().any(|kw| q.contains(kw));
    let has_image = IMAGE_KEYWORDS.iter().any(|kw| q.contains(kw));

    Some(match (has_table, has_image) {
        (true, false) => Intent::Table,
        (_, true) => Intent::Both,
        (false, false) => Intent::Text,
    })
}

/// Model answers mentioning `both` win over `table`; anything else is text
pub const INTENT_RULES: LabelRules<Intent> = LabelRules::new(&[
    LabelRule { needles: &["both"], label: Intent::Both },
    LabelRule { needles: &["table"], label: Intent::Table },
]);

/// Map a free-text model answer onto an intent
pub fn parse_model_intent(answer: &str) -> Intent {
    INTENT_RULES.resolve(answer, Intent::Text)
}

/// Rule-first intent resolution with a model fallback
pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Resolve the intent for a query; never fails
    pub async fn resolve(&self, query: &str, mode: QueryMode) -> Intent {
        if let Some(intent) = mode.forced_intent() {
            return intent;
        }

        match detect_intent_rule(query) {
            Some(intent) => {
                tracing::debug!("Rule intent: {}", intent);
                intent
            }
            None => self.detect_intent_model(query).await,
        }
    }

    /// Single-word model classification; any failure yields `text`
    pub async fn detect_intent_model(&self, query: &str) -> Intent {
        let Some(llm) = &self.llm else {
            return Intent::Text;
        };

        let prompt = PromptBuilder::query_intent(query);
        match tokio::time::timeout(self.timeout, llm.generate(&prompt)).await {
            Ok(Ok(answer)) => parse_model_intent(&answer),
            Ok(Err(e)) => {
                tracing::warn!("Intent classification failed: {}, defaulting to text", e);
                Intent::Text
            }
            Err(_) => {
                tracing::warn!("Intent classification timed out, defaulting to text");
                Intent::Text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::providers::llm::MockLlmProvider;

    fn classifier(llm: MockLlmProvider) -> IntentClassifier {
        IntentClassifier::new(Some(Arc::new(llm)), Duration::from_secs(5))
    }

    #[test]
    fn test_rule_intent() {
        assert_eq!(detect_intent_rule("ขอดูตารางรายการเดินบัญชี"), Some(Intent::Table));
        assert_eq!(detect_intent_rule("Show the LOGO"), Some(Intent::Both));
        assert_eq!(detect_intent_rule("กราฟในตาราง"), Some(Intent::Both));
        assert_eq!(detect_intent_rule("who signed the letter"), Some(Intent::Text));
        assert_eq!(detect_intent_rule("   "), None);
    }

    #[test]
    fn test_parse_model_intent() {
        assert_eq!(parse_model_intent("Both"), Intent::Both);
        assert_eq!(parse_model_intent(" table\n"), Intent::Table);
        assert_eq!(parse_model_intent("I think text"), Intent::Text);
        assert_eq!(parse_model_intent("???"), Intent::Text);
        assert_eq!(parse_model_intent("a table, or maybe both"), Intent::Both);
        assert_eq!(parse_model_intent(""), Intent::Text);
    }

    #[tokio::test]
    async fn test_table_query_skips_model() {
        let mut llm = MockLlmProvider::new();
        llm.expect_generate().never();

        let intent = classifier(llm).resolve("ขอดูตารางรายการเดินบัญชี", QueryMode::Auto).await;
        assert_eq!(intent, Intent::Table);
    }

    #[tokio::test]
    async fn test_explicit_mode_wins() {
        let mut llm = MockLlmProvider::new();
        llm.expect_generate().never();

        let intent = classifier(llm).resolve("ขอดูตาราง", QueryMode::Text).await;
        assert_eq!(intent, Intent::Text);
    }

    #[tokio::test]
    async fn test_empty_query_escalates_to_model() {
        let mut llm = MockLlmProvider::new();
        llm.expect_generate().times(1).returning(|_| Ok("table".to_string()));

        assert_eq!(classifier(llm).resolve("", QueryMode::Auto).await, Intent::Table);
    }

    #[tokio::test]
    async fn test_model_failure_defaults_to_text() {
        let mut llm = MockLlmProvider::new();
        llm.expect_generate()
            .times(1)
            .returning(|_| Err(Error::llm("connection refused")));

        assert_eq!(classifier(llm).detect_intent_model("q").await, Intent::Text);
        assert_eq!(
            IntentClassifier::new(None, Duration::from_secs(1)).detect_intent_model("q").await,
            Intent::Text
        );
    }
}
