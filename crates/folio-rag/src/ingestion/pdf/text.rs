//! Text block extraction: spans → lines → blocks

use std::path::Path;

use super::layout::{PdfSource, TextSpan};
use crate::error::Result;
use crate::types::{block_id, BBox, DocumentMetadata, DocumentType, Extra, IngestedDocument, Stage, TextBlock};

/// Baselines closer than this fraction of the font size share a line
const SAME_LINE: f32 = 0.5;
/// Horizontal gap (fraction of font size) that becomes a space inside a line
const WORD_GAP: f32 = 0.15;
/// Maximum vertical gap (fraction of font size) between lines of one block
const LINE_GAP: f32 = 0.8;
/// Maximum font size ratio between lines of one block
const SIZE_RATIO: f32 = 1.3;

/// Open a PDF and extract its text blocks
///
/// Tables and images are left empty; they come from [`super::extract_tables`]
/// and [`super::extract_images`]. Only a missing or corrupt file is an error.
pub fn parse_pdf(path: &Path, doc_type_hint: DocumentType, doc_id: Option<&str>) -> Result<IngestedDocument> {
    let source = PdfSource::open(path)?;
    let doc_id = doc_id.map(str::to_string).unwrap_or_else(|| default_doc_id(path));

    let metadata = DocumentMetadata::new(&doc_id, source.file_name(), doc_type_hint, source.page_count());
    let mut doc = IngestedDocument::new(metadata);

    for layout in source.layouts(&super::PageSelection::All) {
        let blocks = group_blocks(&layout.spans);
        tracing::debug!("Page {}: {} spans, {} blocks", layout.number, layout.spans.len(), blocks.len());
        for block in blocks {
            let content = block.content();
            if content.trim().is_empty() {
                continue;
            }
            let mut text = TextBlock::new(block_id("txt", doc.texts.len() + 1), &doc_id, layout.number, content);
            text.bbox = Some(block.bbox());
            let mut extra = Extra::new();
            extra.set(Stage::Extraction, "avg_font_size", round2(block.avg_size()));
            text.extra = extra;
            doc.texts.push(text);
        }
    }

    tracing::info!(
        "Extracted {} text blocks from {} ({} pages)",
        doc.texts.len(),
        doc.metadata.file_name,
        doc.metadata.page_count
    );
    Ok(doc)
}

/// File stem, used when the caller does not supply a doc_id
pub fn default_doc_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn round2(v: f32) -> f64 {
    (f64::from(v) * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub(crate) struct Line {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
    pub baseline: f32,
    pub size: f32,
    pub spans: Vec<TextSpan>,
}

impl Line {
    fn start(span: &TextSpan) -> Self {
        Self {
            text: span.text.clone(),
            x0: span.x0,
            x1: span.x1,
            top: span.top,
            bottom: span.bottom,
            baseline: span.baseline,
            size: span.size,
            spans: vec![span.clone()],
        }
    }

    fn push(&mut self, span: &TextSpan) {
        let gap = span.x0 - self.x1;
        if gap > WORD_GAP * self.size.max(span.size) && !self.text.ends_with(' ') && !span.text.starts_with(' ') {
            self.text.push(' ');
        }
        self.text.push_str(&span.text);
        self.x0 = self.x0.min(span.x0);
        self.x1 = self.x1.max(span.x1);
        self.top = self.top.min(span.top);
        self.bottom = self.bottom.max(span.bottom);
        self.size = self.size.max(span.size);
        self.spans.push(span.clone());
    }
}

/// Group spans into reading-order lines
pub(crate) fn group_lines(spans: &[TextSpan]) -> Vec<Line> {
    let mut sorted: Vec<&TextSpan> = spans.iter().collect();
    sorted.sort_by(|a, b| a.baseline.total_cmp(&b.baseline).then(a.x0.total_cmp(&b.x0)));

    let mut lines: Vec<Line> = Vec::new();
    let mut row: Vec<&TextSpan> = Vec::new();
    for span in sorted {
        let same_row = row
            .first()
            .map(|first| (span.baseline - first.baseline).abs() <= SAME_LINE * first.size.max(span.size))
            .unwrap_or(true);
        if !same_row {
            lines.extend(build_row(&mut row));
        }
        row.push(span);
    }
    lines.extend(build_row(&mut row));
    lines
}

/// Every span of the row lands in the line, left to right
fn build_row(row: &mut Vec<&TextSpan>) -> Option<Line> {
    if row.is_empty() {
        return None;
    }
    row.sort_by(|a, b| a.x0.total_cmp(&b.x0));
    let mut line = Line::start(row[0]);
    for span in row.iter().skip(1) {
        line.push(span);
    }
    row.clear();
    Some(line.trimmed())
}

impl Line {
    fn trimmed(mut self) -> Self {
        self.text = self.text.trim().to_string();
        self
    }
}

#[derive(Debug, Clone)]
struct Block {
    lines: Vec<Line>,
    x0: f32,
    x1: f32,
    top: f32,
    bottom: f32,
}

impl Block {
    fn start(line: Line) -> Self {
        Self {
            x0: line.x0,
            x1: line.x1,
            top: line.top,
            bottom: line.bottom,
            lines: vec![line],
        }
    }

    fn last_size(&self) -> f32 {
        self.lines.last().map(|l| l.size).unwrap_or(0.0)
    }

    fn accepts(&self, line: &Line) -> bool {
        let size = self.last_size().max(line.size);
        let gap = line.top - self.bottom;
        let overlaps = line.x0 <= self.x1 && line.x1 >= self.x0;
        let ratio = self.last_size().max(line.size) / self.last_size().min(line.size).max(0.1);
        gap <= LINE_GAP * size && gap >= -SAME_LINE * size && overlaps && ratio <= SIZE_RATIO
    }

    fn push(&mut self, line: Line) {
        self.x0 = self.x0.min(line.x0);
        self.x1 = self.x1.max(line.x1);
        self.top = self.top.min(line.top);
        self.bottom = self.bottom.max(line.bottom);
        self.lines.push(line);
    }

    fn content(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn bbox(&self) -> BBox {
        [self.x0, self.top, self.x1, self.bottom]
    }

    fn avg_size(&self) -> f32 {
        let spans: Vec<f32> = self.lines.iter().flat_map(|l| l.spans.iter().map(|s| s.size)).collect();
        if spans.is_empty() {
            0.0
        } else {
            spans.iter().sum::<f32>() / spans.len() as f32
        }
    }
}

fn group_blocks(spans: &[TextSpan]) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for line in group_lines(spans) {
        // Most recent compatible block first, so side-by-side columns stay apart
        match blocks.iter_mut().rev().find(|b| b.accepts(&line)) {
            Some(block) => block.push(line),
            None => blocks.push(Block::start(line)),
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::pdf::layout::tests::{build_pdf, save_pdf, text_at};

    fn span(text: &str, x0: f32, baseline: f32, size: f32) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            x0,
            x1: x0 + text.len() as f32 * size * 0.5,
            top: baseline - size * 0.8,
            bottom: baseline + size * 0.2,
            baseline,
            size,
        }
    }

    #[test]
    fn test_spans_on_one_baseline_form_a_line() {
        let spans = vec![span("World", 60.0, 100.0, 10.0), span("Hello", 30.0, 100.2, 10.0)];
        let lines = group_lines(&spans);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Hello World");
    }

    #[test]
    fn test_mixed_font_sizes_keep_every_span() {
        let spans = vec![
            span("TOTAL", 20.0, 100.0, 20.0),
            span("label", 0.0, 101.0, 6.0),
            span("12,500.00", 200.0, 109.0, 6.0),
        ];
        let lines = group_lines(&spans);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "label TOTAL 12,500.00");
        assert_eq!(lines[0].spans.len(), 3);
    }

    #[test]
    fn test_adjacent_lines_merge_and_distant_lines_split() {
        let spans = vec![
            span("First line", 50.0, 100.0, 10.0),
            span("second line", 50.0, 112.0, 10.0),
            span("New paragraph", 50.0, 200.0, 10.0),
        ];
        let blocks = group_blocks(&spans);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].content(), "First line second line");
        assert_eq!(blocks[1].content(), "New paragraph");
    }

    #[test]
    fn test_column_split_follows_vertical_gap() {
        let spans = vec![
            span("Left", 50.0, 100.0, 10.0),
            span("Right", 400.0, 100.0, 10.0),
            span("left two", 50.0, 112.0, 10.0),
        ];
        // Spans sharing a baseline always form one line
        let blocks = group_blocks(&spans);
        assert_eq!(blocks.len(), 1);

        let spans = vec![span("Left", 50.0, 100.0, 10.0), span("Right", 400.0, 130.0, 10.0)];
        assert_eq!(group_blocks(&spans).len(), 2);
    }

    #[test]
    fn test_parse_pdf_assigns_ids_and_defaults_doc_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut ops = text_at(72, 742, "Statement of Account");
        ops.extend(text_at(72, 500, "Closing balance 1,250.00"));
        let mut doc = build_pdf(ops);
        let path = save_pdf(&mut doc, dir.path(), "stmt_2024_01.pdf");

        let ingested = parse_pdf(&path, DocumentType::Generic, None).unwrap();
        assert_eq!(ingested.doc_id(), "stmt_2024_01");
        assert_eq!(ingested.metadata.file_name, "stmt_2024_01.pdf");
        assert_eq!(ingested.metadata.page_count, 1);
        assert_eq!(ingested.texts.len(), 2);
        assert_eq!(ingested.texts[0].id, "txt_0001");
        assert_eq!(ingested.texts[1].id, "txt_0002");
        assert_eq!(ingested.texts[0].content, "Statement of Account");
        assert!(ingested.texts[0].bbox.is_some());
        assert_eq!(
            ingested.texts[0].extra.get(Stage::Extraction, "avg_font_size").and_then(|v| v.as_f64()),
            Some(10.0)
        );
        assert!(ingested.tables.is_empty());
    }

    #[test]
    fn test_parse_pdf_explicit_doc_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = build_pdf(text_at(72, 700, "Invoice"));
        let path = save_pdf(&mut doc, dir.path(), "a.pdf");
        let ingested = parse_pdf(&path, DocumentType::Invoice, Some("inv_7")).unwrap();
        assert_eq!(ingested.doc_id(), "inv_7");
        assert_eq!(ingested.texts[0].doc_id, "inv_7");
        assert_eq!(ingested.doc_type(), DocumentType::Invoice);
    }
}
