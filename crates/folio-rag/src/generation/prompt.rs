//! Prompt templates for classification, enrichment, intent and grounded answers

use crate::labels::Label;
use crate::types::{DocumentType, QueryMode, SectionLabel, TextRole};

/// Answer the model is told to give when the context is insufficient
pub const UNKNOWN_ANSWER: &str = "ไม่ทราบจากข้อมูลที่มีอยู่";

/// Prompt builder for every model call made by the pipeline
pub struct PromptBuilder;

impl PromptBuilder {
    /// Forced single-label document classification
    pub fn document_classification(file_name: &str, sample: &str) -> String {
        format!(
            r#"You are a professional document classifier.

Classify the following PDF text into ONE label:

{labels}

File name: {file_name}

Text sample:
"""{sample}"""

Respond ONLY with a label from the list above."#,
            labels = DocumentType::prompt_list(),
            file_name = file_name,
            sample = sample,
        )
    }

    /// Section tagging for one batch; `offset` is the index of the first block
    pub fn section_batch<'a>(offset: usize, blocks: impl IntoIterator<Item = &'a str>) -> String {
        let listing = blocks
            .into_iter()
            .enumerate()
            .map(|(i, content)| format!("[{}] {}", offset + i, content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are a document segmenter.

For each numbered text block below, assign ONE section label from:
{labels}

Format: one line per block, in the form:
index: label

Text blocks:
{listing}"#,
            labels = SectionLabel::prompt_list(),
            listing = listing,
        )
    }

    /// Text role tagging for one batch of `(section, content)` pairs
    pub fn role_batch<'a>(offset: usize, blocks: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
        let listing = blocks
            .into_iter()
            .enumerate()
            .map(|(i, (section, content))| format!("[{}] (section={}) {}", offset + i, section, content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are a document text role classifier for bank/financial PDFs.

For each text block, assign ONE role from:
{labels}

Format: one line per block:
index: role

Text blocks:
{listing}"#,
            labels = TextRole::prompt_list(),
            listing = listing,
        )
    }

    /// Single-word query intent classification
    pub fn query_intent(question: &str) -> String {
        format!(
            "คุณเป็นตัวจัดประเภทคำถามเกี่ยวกับเอกสาร PDF หลายประเภท \
เช่น รายงานบริษัท รายงานวิชาการ คู่มือ สัญญา เอกสารการเงิน ฯลฯ\n\
เป้าหมายคือบอกว่าเมื่อจะตอบคำถามนี้ เราควรโฟกัสข้อมูลจากไหนเป็นหลัก:\n\
- text  = เนื้อหาบรรยาย / ย่อหน้า / ข้อความยาว ๆ\n\
- table = ข้อมูลในตาราง เช่น แถว-คอลัมน์ รายการ สรุปตัวเลข\n\
- both  = ต้องใช้ทั้งข้อความและข้อมูลตารางร่วมกัน\n\n\
ให้ตอบสั้น ๆ เป็นคำเดียวเท่านั้น หนึ่งใน: text, table, both.\n\n\
คำถาม: {question}\n\n\
ตอบแค่หนึ่งคำ: text, table หรือ both"
        )
    }

    /// Strictly grounded answer prompt
    pub fn grounded_answer(question: &str, context: &str, intent: &str, mode: QueryMode) -> String {
        format!(
            "คุณเป็นผู้ช่วยอ่านและวิเคราะห์เอกสาร PDF หลายประเภท \
(เช่น รายงานบริษัท รายงานวิชาการ คู่มือ สัญญา เอกสารการเงิน ฯลฯ).\n\
ให้ตอบคำถามโดยอ้างอิงเฉพาะจาก CONTEXT ด้านล่างนี้เท่านั้น ห้ามเดาเกินข้อมูลในเอกสาร.\n\
ถ้าข้อมูลไม่พอ ให้ตอบว่า '{unknown}'.\n\n\
(query intent: {intent}, mode: {mode})\n\n\
=== CONTEXT START ===\n\
{context}\n\
=== CONTEXT END ===\n\n\
ตอนนี้ให้ตอบคำถามของผู้ใช้ด้านล่างให้กระชับ ชัดเจน และอ้างอิงจากเนื้อหาใน CONTEXT เท่านั้น.\n\n\
คำถาม: {question}",
            unknown = UNKNOWN_ANSWER,
            intent = intent,
            mode = mode_name(mode),
            context = context,
            question = question,
        )
    }
}

fn mode_name(mode: QueryMode) -> &'static str {
    match mode {
        QueryMode::Auto => "auto",
        QueryMode::Text => "text",
        QueryMode::Table => "table",
        QueryMode::Both => "both",
    }
}

/// Parse `index: label` lines; malformed lines are skipped
pub fn parse_index_labels(response: &str) -> Vec<(usize, String)> {
    response
        .lines()
        .filter_map(|line| {
            let (index, label) = line.trim().split_once(':')?;
            let index = index.trim().trim_matches(|c| c == '[' || c == ']').trim();
            let index = index.parse::<usize>().ok()?;
            Some((index, label.trim().to_lowercase()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_prompt_lists_labels() {
        let prompt = PromptBuilder::document_classification("stmt.pdf", "ยอดคงเหลือ");
        assert!(prompt.contains("bank_statement, invoice, receipt, purchase_order, delivery_note, tax_form, generic"));
        assert!(prompt.contains("File name: stmt.pdf"));
        assert!(prompt.contains("\"\"\"ยอดคงเหลือ\"\"\""));
    }

    #[test]
    fn test_batch_prompts_use_global_indices() {
        let prompt = PromptBuilder::section_batch(200, ["Opening balance", "Total"]);
        assert!(prompt.contains("[200] Opening balance\n[201] Total"));
        assert!(prompt.contains("header, summary, transactions, footer, other"));

        let prompt = PromptBuilder::role_batch(0, [("transactions", "โอนเงิน 500.00")]);
        assert!(prompt.contains("[0] (section=transactions) โอนเงิน 500.00"));
    }

    #[test]
    fn test_grounded_answer_prompt() {
        let prompt = PromptBuilder::grounded_answer("ยอดคงเหลือเท่าไร", "[1] (doc_id=d) x", "table", QueryMode::Auto);
        assert!(prompt.contains(UNKNOWN_ANSWER));
        assert!(prompt.contains("(query intent: table, mode: auto)"));
        assert!(prompt.contains("=== CONTEXT START ===\n[1] (doc_id=d) x\n=== CONTEXT END ==="));
        assert!(prompt.ends_with("ยอดคงเหลือเท่าไร"));
    }

    #[test]
    fn test_parse_index_labels() {
        let parsed = parse_index_labels("0: header\n[1]: Summary \nnot a line\nx: other\n3:transactions");
        assert_eq!(
            parsed,
            vec![
                (0, "header".to_string()),
                (1, "summary".to_string()),
                (3, "transactions".to_string()),
            ]
        );
    }
}
