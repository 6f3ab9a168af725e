//! Non-destructive cleaning of text and table blocks

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{IngestedDocument, Stage, TableBlock, TextBlock};

// Tab, newline and carriage return survive and are collapsed as whitespace
static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").expect("Invalid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Strip control characters, collapse whitespace, trim
pub fn normalize_text(s: &str) -> String {
    let s = CONTROL_CHARS.replace_all(s, "");
    WHITESPACE.replace_all(&s, " ").trim().to_string()
}

/// Clean every block of a document in place
pub fn clean_document(doc: &mut IngestedDocument) {
    let texts_before = doc.texts.len();
    doc.texts = clean_text_blocks(std::mem::take(&mut doc.texts));
    doc.tables = clean_table_blocks(std::mem::take(&mut doc.tables));
    tracing::info!(
        "Cleaned {}: {} text blocks ({} dropped), {} tables",
        doc.doc_id(),
        doc.texts.len(),
        texts_before - doc.texts.len(),
        doc.tables.len()
    );
}

/// Normalize content; blocks that end up empty are dropped
pub fn clean_text_blocks(blocks: Vec<TextBlock>) -> Vec<TextBlock> {
    blocks
        .into_iter()
        .filter_map(|mut block| {
            let original = block.content.chars().count();
            let cleaned = normalize_text(&block.content);
            if cleaned.is_empty() {
                return None;
            }
            let cleaned_len = cleaned.chars().count();
            block.content = cleaned;
            block.extra.set(Stage::Cleaning, "original_length", original);
            block.extra.set(Stage::Cleaning, "cleaned_length", cleaned_len);
            block.extra.set(Stage::Cleaning, "removed_chars", original - cleaned_len);
            Some(block)
        })
        .collect()
}

/// Normalize cells, pad rows, drop blank columns and blank rows
pub fn clean_table_blocks(tables: Vec<TableBlock>) -> Vec<TableBlock> {
    tables.into_iter().map(clean_table).collect()
}

fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

fn clean_table(mut table: TableBlock) -> TableBlock {
    let original_rows = table.rows.len();
    let original_header = table.columns.len();

    let mut header: Vec<String> = table.columns.iter().map(|c| normalize_text(c)).collect();
    let mut rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(|c| normalize_text(c)).collect())
        .collect();

    if !header.is_empty() && !rows.is_empty() {
        let width = rows.iter().map(Vec::len).chain(std::iter::once(header.len())).max().unwrap_or(0);
        header.resize(width, String::new());
        for row in &mut rows {
            row.resize(width, String::new());
        }

        let keep: Vec<bool> = (0..width)
            .map(|i| !is_blank(&header[i]) || rows.iter().any(|row| !is_blank(&row[i])))
            .collect();
        let retain = |cells: Vec<String>| -> Vec<String> {
            cells.into_iter().zip(&keep).filter(|(_, k)| **k).map(|(c, _)| c).collect()
        };
        header = retain(header);
        rows = rows.into_iter().map(retain).collect();
    }

    rows.retain(|row| row.iter().any(|c| !is_blank(c)));

    table.extra.set(Stage::Cleaning, "original_row_count", original_rows);
    table.extra.set(Stage::Cleaning, "cleaned_row_count", rows.len());
    table.extra.set(Stage::Cleaning, "original_header_len", original_header);
    table.extra.set(Stage::Cleaning, "cleaned_header_len", header.len());
    table.columns = header;
    table.rows = rows;
    table
}
