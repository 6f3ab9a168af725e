//! Rule-based section and text role tagging

use crate::labels::match_any_keyword;
use crate::types::{SectionLabel, TextBlock, TextRole};

const SECTION_KEYWORDS: &[(&[&str], SectionLabel)] = &[
    (&["summary", "สรุป", "overview"], SectionLabel::Summary),
    (
        &["รายการเดินบัญชี", "transaction", "movement", "รายการ", "รายละเอียดบัญชี", "statement"],
        SectionLabel::Transactions,
    ),
    (&["ลงชื่อ", "ผู้มีอำนาจลงนาม", "ขอแสดงความนับถือ", "signature"], SectionLabel::Footer),
];

const TITLE_KEYWORDS: &[&str] = &["statement", "รายงาน", "account statement"];

const ROLE_KEYWORDS: &[(&[&str], TextRole)] = &[
    (&["เลขที่บัญชี", "account no", "account number", "branch", "ธนาคาร"], TextRole::AccountInfo),
    (&["วันที่", "วันเดือนปี", "transaction", "ยอดคงเหลือ", "จำนวนเงิน"], TextRole::TransactionHeader),
    (&["หมายเหตุ", "note:", "หมาย เหตุ"], TextRole::Note),
    (&["ลงชื่อ", "ผู้มีอำนาจลงนาม", "ขอแสดงความนับถือ"], TextRole::FooterText),
];

/// Blocks this close to the start of page 1 may be the document header
const HEADER_BLOCK_WINDOW: usize = 3;
const HEADER_MAX_CHARS: usize = 120;

/// Section of the block at `position` within the document
pub fn guess_section(block: &TextBlock, position: usize) -> SectionLabel {
    let text = block.content.to_lowercase();

    if let Some(label) = match_any_keyword(&text, SECTION_KEYWORDS) {
        return label;
    }

    if block.page == 1 && position < HEADER_BLOCK_WINDOW && block.content.chars().count() <= HEADER_MAX_CHARS {
        return SectionLabel::Header;
    }

    SectionLabel::Other
}

/// Role from keywords, length and the already-assigned section
pub fn guess_role(block: &TextBlock) -> TextRole {
    let text = block.content.trim();
    let lower = text.to_lowercase();
    let len = text.chars().count();

    if len < 80 && TITLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return TextRole::Title;
    }

    if let Some(role) = match_any_keyword(&lower, ROLE_KEYWORDS) {
        return role;
    }

    if block.section == Some(SectionLabel::Transactions) && (10..=200).contains(&len) {
        return TextRole::TransactionRow;
    }

    TextRole::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(page: u32, content: &str) -> TextBlock {
        TextBlock::new("txt_0001", "doc_001", page, content)
    }

    #[test]
    fn test_section_keywords() {
        assert_eq!(guess_section(&block(2, "Account Summary"), 10), SectionLabel::Summary);
        assert_eq!(guess_section(&block(2, "รายการเดินบัญชี"), 10), SectionLabel::Transactions);
        assert_eq!(guess_section(&block(2, "ผู้มีอำนาจลงนาม"), 10), SectionLabel::Footer);
        assert_eq!(guess_section(&block(2, "Thank you"), 10), SectionLabel::Other);
    }

    #[test]
    fn test_header_window() {
        assert_eq!(guess_section(&block(1, "ธนาคารกรุงไทย"), 0), SectionLabel::Header);
        assert_eq!(guess_section(&block(1, "ธนาคารกรุงไทย"), 3), SectionLabel::Other);
        assert_eq!(guess_section(&block(2, "ธนาคารกรุงไทย"), 0), SectionLabel::Other);
        assert_eq!(guess_section(&block(1, &"x".repeat(121)), 0), SectionLabel::Other);
    }

    #[test]
    fn test_roles() {
        assert_eq!(guess_role(&block(1, "Account Statement")), TextRole::Title);
        assert_eq!(guess_role(&block(1, "เลขที่บัญชี 123-4-56789-0")), TextRole::AccountInfo);
        assert_eq!(guess_role(&block(1, "วันที่ รายการ จำนวนเงิน")), TextRole::TransactionHeader);
        assert_eq!(guess_role(&block(1, "Note: fees apply")), TextRole::Note);
        assert_eq!(guess_role(&block(1, "ลงชื่อ")), TextRole::FooterText);
        assert_eq!(guess_role(&block(1, "hello")), TextRole::Other);
    }

    #[test]
    fn test_transaction_row_uses_section() {
        let mut b = block(2, "โอนเงินเข้า 5,000.00");
        assert_eq!(guess_role(&b), TextRole::Other);
        b.section = Some(SectionLabel::Transactions);
        assert_eq!(guess_role(&b), TextRole::TransactionRow);
        b.content = "short".into();
        assert_eq!(guess_role(&b), TextRole::Other);
    }
}
