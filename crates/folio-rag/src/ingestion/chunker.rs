//! Block-to-chunk conversion with provenance metadata

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::types::{Chunk, DocumentType, ImageBlock, IngestedDocument, SourceKind, TableBlock, TextBlock};

/// Rows rendered into a table chunk
pub const MAX_TABLE_ROWS: usize = 10;

/// Every chunk of a document: texts, then tables, then captioned images
pub fn chunk_document(doc: &IngestedDocument) -> Vec<Chunk> {
    let doc_type = doc.doc_type();
    let mut chunks = text_chunks(&doc.texts, doc_type);
    chunks.extend(table_chunks(&doc.tables, doc_type));
    chunks.extend(image_chunks(&doc.images, doc_type));

    tracing::debug!("Chunked {} into {} chunks", doc.doc_id(), chunks.len());
    chunks
}

/// Metadata shared by every chunk kind
fn base_metadata(doc_id: &str, doc_type: DocumentType, source: SourceKind, page: u32) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::new();
    metadata.insert("doc_id".to_string(), json!(doc_id));
    metadata.insert("doc_type".to_string(), json!(doc_type.to_string()));
    metadata.insert("source".to_string(), json!(source.to_string()));
    metadata.insert("page".to_string(), json!(page));
    metadata
}

fn extend(metadata: &mut BTreeMap<String, Value>, fields: Value) {
    if let Value::Object(fields) = fields {
        metadata.extend(fields);
    }
}

/// One chunk per non-empty text block
pub fn text_chunks(texts: &[TextBlock], doc_type: DocumentType) -> Vec<Chunk> {
    texts
        .iter()
        .filter(|block| !block.content.trim().is_empty())
        .map(|block| {
            let mut metadata = base_metadata(&block.doc_id, doc_type, SourceKind::Text, block.page);
            extend(
                &mut metadata,
                json!({
                    "block_id": block.id,
                    "section": block.section.map(|s| s.to_string()),
                    "role": block.role.map(|r| r.to_string()),
                    "bbox": block.bbox,
                }),
            );

            Chunk {
                id: Chunk::compose_id(&block.doc_id, SourceKind::Text, &block.id),
                doc_id: block.doc_id.clone(),
                doc_type,
                source_kind: SourceKind::Text,
                page: block.page,
                content: block.content.clone(),
                metadata,
            }
        })
        .collect()
}

/// `Table {name} (page {page})`, the column list and at most ten pipe-joined rows
pub fn render_table(table: &TableBlock) -> String {
    let rows = table
        .rows
        .iter()
        .take(MAX_TABLE_ROWS)
        .map(|row| row.join(" | "))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Table {} (page {})\nColumns: {}\nRows:\n{}",
        table.display_name(),
        table.page,
        table.columns.join(" | "),
        rows
    )
}

/// One chunk per table
pub fn table_chunks(tables: &[TableBlock], doc_type: DocumentType) -> Vec<Chunk> {
    tables
        .iter()
        .map(|table| {
            let mut metadata = base_metadata(&table.doc_id, doc_type, SourceKind::Table, table.page);
            extend(
                &mut metadata,
                json!({
                    "table_id": table.id,
                    "name": table.name,
                    "columns": table.columns,
                    "role": table.role.map(|r| r.to_string()),
                    "bbox": table.bbox,
                }),
            );

            Chunk {
                id: Chunk::compose_id(&table.doc_id, SourceKind::Table, &table.id),
                doc_id: table.doc_id.clone(),
                doc_type,
                source_kind: SourceKind::Table,
                page: table.page,
                content: render_table(table),
                metadata,
            }
        })
        .collect()
}

/// One chunk per image with a non-empty caption
pub fn image_chunks(images: &[ImageBlock], doc_type: DocumentType) -> Vec<Chunk> {
    images
        .iter()
        .filter_map(|image| {
            let caption = image.caption.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
            let mut metadata = base_metadata(&image.doc_id, doc_type, SourceKind::Image, image.page);
            extend(
                &mut metadata,
                json!({
                    "image_id": image.id,
                    "file_path": image.file_path,
                    "bbox": image.bbox,
                }),
            );

            Some(Chunk {
                id: Chunk::compose_id(&image.doc_id, SourceKind::Image, &image.id),
                doc_id: image.doc_id.clone(),
                doc_type,
                source_kind: SourceKind::Image,
                page: image.page,
                content: caption.to_string(),
                metadata,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentMetadata, Extra};
    use std::collections::HashSet;

    fn image(id: &str, caption: Option<&str>) -> ImageBlock {
        ImageBlock {
            id: id.into(),
            doc_id: "doc_001".into(),
            page: 2,
            file_path: format!("ingested/doc_001/images/{}.jpg", id),
            caption: caption.map(str::to_string),
            section: None,
            category: None,
            bbox: Some([10.0, 20.0, 110.0, 70.0]),
            extra: Extra::new(),
        }
    }

    fn sample_doc(doc_id: &str) -> IngestedDocument {
        let mut doc = IngestedDocument::new(DocumentMetadata::new(doc_id, "a.pdf", DocumentType::BankStatement, 2));
        doc.texts.push(TextBlock::new("txt_0001", doc_id, 1, "Opening balance"));
        doc.texts.push(TextBlock::new("txt_0002", doc_id, 1, "   "));
        doc.tables.push(TableBlock::new(
            "tbl_0001",
            doc_id,
            2,
            vec!["date".into(), "amount".into()],
            vec![vec!["01/01".into(), "10.00".into()]],
        ));
        doc
    }

    #[test]
    fn test_table_rendering_caps_rows() {
        let rows: Vec<Vec<String>> = (1..=25).map(|i| vec![format!("r{}", i), format!("{}.00", i)]).collect();
        let mut table = TableBlock::new("tbl_0001", "doc_001", 3, vec!["date".into(), "amount".into()], rows);
        table.name = Some("table_1".into());

        let rendered = render_table(&table);
        assert!(rendered.starts_with("Table table_1 (page 3)\nColumns: date | amount\nRows:\nr1 | 1.00"));
        assert!(rendered.contains("r10 | 10.00"));
        assert!(!rendered.contains("r11"));
        assert_eq!(rendered.lines().count(), 3 + MAX_TABLE_ROWS);
    }

    #[test]
    fn test_chunk_ids_and_metadata() {
        let chunks = chunk_document(&sample_doc("doc_001"));
        assert_eq!(chunks.len(), 2);

        let text = &chunks[0];
        assert_eq!(text.id, "doc_001::text::txt_0001");
        assert_eq!(text.metadata["source"], "text");
        assert_eq!(text.metadata["doc_type"], "bank_statement");
        assert_eq!(text.metadata["page"], 1);

        let table = &chunks[1];
        assert_eq!(table.id, "doc_001::table::tbl_0001");
        assert_eq!(table.source_kind, SourceKind::Table);
        assert_eq!(table.metadata["columns"], json!(["date", "amount"]));
        assert!(table.content.starts_with("Table tbl_0001 (page 2)"));
    }

    #[test]
    fn test_only_captioned_images_are_chunked() {
        let images = vec![image("img_0001", Some("Bank logo")), image("img_0002", None), image("img_0003", Some("  "))];
        let chunks = image_chunks(&images, DocumentType::Generic);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Bank logo");
        assert_eq!(chunks[0].metadata["file_path"], "ingested/doc_001/images/img_0001.jpg");
    }

    #[test]
    fn test_ids_unique_across_documents() {
        let mut ids = HashSet::new();
        for doc_id in ["doc_001", "doc_002"] {
            for chunk in chunk_document(&sample_doc(doc_id)) {
                assert!(ids.insert(chunk.id));
            }
        }
        assert_eq!(ids.len(), 4);
    }
}
