//! Structural health checks over an ingested document
//!
//! Findings are recorded, never raised; the pipeline always continues.

use crate::types::{ImageBlock, IngestedDocument, Issue, IssueCode, IssueLevel, Stage};

/// Run every check
pub fn validate_all(doc: &IngestedDocument) -> Vec<Issue> {
    let mut issues = validate_document_structure(doc);
    issues.extend(validate_tables(doc));
    issues.extend(validate_images(doc));
    issues
}

/// Metadata and text baseline
pub fn validate_document_structure(doc: &IngestedDocument) -> Vec<Issue> {
    let mut issues = Vec::new();

    if doc.metadata.doc_id.trim().is_empty() {
        issues.push(Issue::new(
            IssueLevel::Error,
            IssueCode::MissingDocId,
            "Document metadata.doc_id is empty.",
        ));
    }

    if doc.metadata.file_name.trim().is_empty() {
        issues.push(Issue::new(
            IssueLevel::Warning,
            IssueCode::MissingFileName,
            "Document metadata.file_name is empty.",
        ));
    }

    if doc.texts.is_empty() {
        issues.push(Issue::new(
            IssueLevel::Error,
            IssueCode::NoTextBlocks,
            "Document has no TextBlock entries.",
        ));
    }

    issues
}

/// Header/row presence and per-row width
pub fn validate_tables(doc: &IngestedDocument) -> Vec<Issue> {
    let mut issues = Vec::new();

    for (idx, table) in doc.tables.iter().enumerate() {
        let header = &table.columns;
        let rows = &table.rows;

        if header.is_empty() && !rows.is_empty() {
            issues.push(
                Issue::new(
                    IssueLevel::Warning,
                    IssueCode::TableNoHeader,
                    format!("Table index={} has rows but empty header.", idx),
                )
                .with("table_index", idx),
            );
        }

        if !header.is_empty() && rows.is_empty() {
            issues.push(
                Issue::new(
                    IssueLevel::Warning,
                    IssueCode::TableNoRows,
                    format!("Table index={} has header but no rows.", idx),
                )
                .with("table_index", idx),
            );
        }

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                issues.push(
                    Issue::new(
                        IssueLevel::Warning,
                        IssueCode::RowLenMismatch,
                        format!(
                            "Table index={} row={} len(row)={} != len(header)={}",
                            idx,
                            row_idx,
                            row.len(),
                            header.len()
                        ),
                    )
                    .with("table_index", idx)
                    .with("row_index", row_idx),
                );
            }
        }
    }

    issues
}

fn has_reference(image: &ImageBlock) -> bool {
    !image.file_path.trim().is_empty() || image.extra.get(Stage::Extraction, "xref").is_some()
}

/// Every image needs a file path or an internal reference
pub fn validate_images(doc: &IngestedDocument) -> Vec<Issue> {
    doc.images
        .iter()
        .enumerate()
        .filter(|(_, image)| !has_reference(image))
        .map(|(idx, _)| {
            Issue::new(
                IssueLevel::Warning,
                IssueCode::ImageNoPath,
                format!("Image index={} has no file path or reference.", idx),
            )
            .with("image_index", idx)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentMetadata, DocumentType, Extra, TableBlock, TextBlock};

    fn base_doc() -> IngestedDocument {
        let mut doc = IngestedDocument::new(DocumentMetadata::new("doc_001", "a.pdf", DocumentType::Generic, 1));
        doc.texts.push(TextBlock::new("txt_0001", "doc_001", 1, "hello"));
        doc
    }

    fn image(file_path: &str) -> ImageBlock {
        ImageBlock {
            id: "img_0001".into(),
            doc_id: "doc_001".into(),
            page: 1,
            file_path: file_path.into(),
            caption: None,
            section: None,
            category: None,
            bbox: None,
            extra: Extra::new(),
        }
    }

    #[test]
    fn test_clean_document_has_no_issues() {
        assert!(validate_all(&base_doc()).is_empty());
    }

    #[test]
    fn test_structure_issues() {
        let mut doc = base_doc();
        doc.metadata.doc_id.clear();
        doc.metadata.file_name.clear();
        doc.texts.clear();

        let codes: Vec<_> = validate_all(&doc).into_iter().map(|i| (i.level, i.code)).collect();
        assert_eq!(
            codes,
            vec![
                (IssueLevel::Error, IssueCode::MissingDocId),
                (IssueLevel::Warning, IssueCode::MissingFileName),
                (IssueLevel::Error, IssueCode::NoTextBlocks),
            ]
        );
    }

    #[test]
    fn test_table_issues() {
        let mut doc = base_doc();
        doc.tables.push(TableBlock::new("tbl_0001", "doc_001", 1, vec!["a".into(), "b".into()], vec![]));
        doc.tables.push(TableBlock::new("tbl_0002", "doc_001", 1, vec![], vec![vec!["x".into()]]));
        doc.tables.push(TableBlock::new(
            "tbl_0003",
            "doc_001",
            1,
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "2".into()], vec!["3".into()]],
        ));

        let issues = validate_tables(&doc);
        assert_eq!(issues[0].code, IssueCode::TableNoRows);
        assert_eq!(issues[1].code, IssueCode::TableNoHeader);
        // rows-without-header also mismatch their (empty) header
        assert_eq!(issues[2].code, IssueCode::RowLenMismatch);
        assert_eq!(issues[3].code, IssueCode::RowLenMismatch);
        assert_eq!(issues[3].context["table_index"], 2);
        assert_eq!(issues[3].context["row_index"], 1);
        assert_eq!(issues.len(), 4);
    }

    #[test]
    fn test_image_reference() {
        let mut doc = base_doc();
        doc.images.push(image("ingested/doc_001/images/img_p001_001.jpg"));
        doc.images.push(image(""));
        let mut with_xref = image("");
        with_xref.extra.set(Stage::Extraction, "xref", 12u32);
        doc.images.push(with_xref);

        let issues = validate_images(&doc);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].context["image_index"], 1);
    }
}
