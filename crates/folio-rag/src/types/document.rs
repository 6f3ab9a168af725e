//! Ingested document model: metadata plus text, table and image blocks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::extra::Extra;
use crate::labels::impl_label;

/// Axis-aligned rectangle `[x0, y0, x1, y1]`, top-left origin, PDF points
pub type BBox = [f32; 4];

/// Document type assigned by the classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    BankStatement,
    Invoice,
    Receipt,
    PurchaseOrder,
    DeliveryNote,
    TaxForm,
    #[default]
    Generic,
}

impl_label!(DocumentType {
    BankStatement => "bank_statement",
    Invoice => "invoice",
    Receipt => "receipt",
    PurchaseOrder => "purchase_order",
    DeliveryNote => "delivery_note",
    TaxForm => "tax_form",
    Generic => "generic",
});

/// Section a text block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionLabel {
    Header,
    Summary,
    Transactions,
    Footer,
    Other,
}

impl_label!(SectionLabel {
    Header => "header",
    Summary => "summary",
    Transactions => "transactions",
    Footer => "footer",
    Other => "other",
});

/// Role of a text block inside its section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRole {
    Title,
    AccountInfo,
    TransactionHeader,
    TransactionRow,
    Note,
    FooterText,
    Other,
}

impl_label!(TextRole {
    Title => "title",
    AccountInfo => "account_info",
    TransactionHeader => "transaction_header",
    TransactionRow => "transaction_row",
    Note => "note",
    FooterText => "footer_text",
    Other => "other",
});

/// Coarse table category guessed at extraction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableCategory {
    TransactionTable,
    ItemList,
    GenericTable,
}

impl_label!(TableCategory {
    TransactionTable => "transaction_table",
    ItemList => "item_list",
    GenericTable => "generic_table",
});

/// Table role assigned by enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    TransactionTable,
    SummaryTable,
    OtherTable,
}

impl_label!(TableRole {
    TransactionTable => "transaction_table",
    SummaryTable => "summary_table",
    OtherTable => "other_table",
});

fn default_source() -> String {
    "uploaded".to_string()
}

/// Per-document metadata, created once at extraction time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub doc_id: String,
    pub file_name: String,
    /// Initial hint, overwritten by the classifier
    pub doc_type: DocumentType,
    pub page_count: u32,
    pub ingested_at: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: String,
}

impl DocumentMetadata {
    pub fn new(doc_id: impl Into<String>, file_name: impl Into<String>, doc_type: DocumentType, page_count: u32) -> Self {
        Self {
            doc_id: doc_id.into(),
            file_name: file_name.into(),
            doc_type,
            page_count,
            ingested_at: Utc::now(),
            source: default_source(),
        }
    }
}

/// A paragraph-like run of text on one page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextBlock {
    pub id: String,
    pub doc_id: String,
    /// 1-indexed
    pub page: u32,
    pub content: String,
    #[serde(default)]
    pub section: Option<SectionLabel>,
    #[serde(default)]
    pub role: Option<TextRole>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

impl TextBlock {
    pub fn new(id: impl Into<String>, doc_id: impl Into<String>, page: u32, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_id: doc_id.into(),
            page,
            content: content.into(),
            section: None,
            role: None,
            bbox: None,
            extra: Extra::new(),
        }
    }
}

/// A detected table grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableBlock {
    pub id: String,
    pub doc_id: String,
    pub page: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub category: Option<TableCategory>,
    #[serde(default)]
    pub role: Option<TableRole>,
    /// Header row
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

impl TableBlock {
    pub fn new(id: impl Into<String>, doc_id: impl Into<String>, page: u32, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            id: id.into(),
            doc_id: doc_id.into(),
            page,
            name: None,
            section: None,
            category: None,
            role: None,
            columns,
            rows,
            bbox: None,
            extra: Extra::new(),
        }
    }

    /// Display name, falling back to the block id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// An embedded raster image written to disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageBlock {
    pub id: String,
    pub doc_id: String,
    pub page: u32,
    pub file_path: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

/// Unit of ownership passed between pipeline stages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestedDocument {
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub texts: Vec<TextBlock>,
    #[serde(default)]
    pub tables: Vec<TableBlock>,
    #[serde(default)]
    pub images: Vec<ImageBlock>,
}

impl IngestedDocument {
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            metadata,
            texts: Vec::new(),
            tables: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.metadata.doc_id
    }

    pub fn doc_type(&self) -> DocumentType {
        self.metadata.doc_type
    }
}

/// Sequential block id, e.g. `txt_0001`
pub fn block_id(prefix: &str, index: usize) -> String {
    format!("{}_{:04}", prefix, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_format() {
        assert_eq!(block_id("txt", 1), "txt_0001");
        assert_eq!(block_id("tbl", 42), "tbl_0042");
    }

    #[test]
    fn test_labels_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&DocumentType::BankStatement).unwrap(), "\"bank_statement\"");
        assert_eq!(serde_json::to_string(&TextRole::FooterText).unwrap(), "\"footer_text\"");
        assert_eq!("purchase_order".parse::<DocumentType>().unwrap(), DocumentType::PurchaseOrder);
    }

    #[test]
    fn test_metadata_source_defaults_when_absent() {
        let json = r#"{
            "doc_id": "stmt_01",
            "file_name": "stmt_01.pdf",
            "doc_type": "generic",
            "page_count": 2,
            "ingested_at": "2024-01-05T10:00:00Z"
        }"#;
        let meta: DocumentMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.source, "uploaded");
        assert_eq!(meta.page_count, 2);
    }

    #[test]
    fn test_text_block_without_enrichment_fields() {
        let json = r#"{"id": "txt_0001", "doc_id": "d", "page": 1, "content": "hello"}"#;
        let block: TextBlock = serde_json::from_str(json).unwrap();
        assert!(block.section.is_none());
        assert!(block.bbox.is_none());
        assert!(block.extra.is_empty());
    }
}
