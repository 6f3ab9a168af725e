//! Table detection over page layouts
//!
//! Two strategies share the [`TableStrategy`] trait:
//!
//! - [`StructuralLines`] rebuilds a cell grid from drawn ruling lines.
//! - [`Whitespace`] projects aligned text fragments onto columns.
//!
//! [`detect_tables`] tries them in priority order and keeps the results of the
//! first strategy that finds anything.

use std::path::Path;

use super::layout::{PageLayout, PdfSource, Ruling, TextSpan};
use super::text::group_lines;
use super::{PageSelection, TableFlavor};
use crate::error::Result;
use crate::types::{block_id, BBox, DocumentType, Extra, Stage, TableBlock, TableCategory};

const SNAP: f32 = 2.0;
const MIN_GRID_LINES: usize = 3;
/// Gap (fraction of font size) separating two whitespace-table cells
const CELL_GAP: f32 = 1.0;
/// Maximum gap (fraction of font size) between consecutive table lines
const ROW_GAP: f32 = 2.0;

/// A raw cell grid found on one page
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    pub page: u32,
    pub cells: Vec<Vec<String>>,
    pub bbox: Option<BBox>,
}

impl DetectedTable {
    /// Share of empty cells, 0-100
    fn whitespace_ratio(&self) -> f64 {
        let total: usize = self.cells.iter().map(Vec::len).sum();
        if total == 0 {
            return 100.0;
        }
        let empty = self.cells.iter().flatten().filter(|c| c.trim().is_empty()).count();
        (empty as f64 * 10000.0 / total as f64).round() / 100.0
    }
}

/// A table detection algorithm
pub trait TableStrategy: Send + Sync {
    fn flavor(&self) -> TableFlavor;

    /// Tables on one page; an error disqualifies the whole strategy
    fn detect(&self, page: &PageLayout) -> Result<Vec<DetectedTable>>;
}

/// Strategy implementing a flavor
pub fn strategy_for(flavor: TableFlavor) -> Box<dyn TableStrategy> {
    match flavor {
        TableFlavor::StructuralLines => Box::new(StructuralLines),
        TableFlavor::Whitespace => Box::new(Whitespace),
    }
}

/// Run strategies in order; the first one yielding tables wins
pub fn detect_tables(
    pages: &[PageLayout],
    strategies: &[Box<dyn TableStrategy>],
) -> Option<(TableFlavor, Vec<DetectedTable>)> {
    'strategies: for strategy in strategies {
        let mut found = Vec::new();
        for page in pages {
            match strategy.detect(page) {
                Ok(tables) => found.extend(tables),
                Err(e) => {
                    tracing::warn!("Table strategy {} failed on page {}: {}", strategy.flavor().as_str(), page.number, e);
                    continue 'strategies;
                }
            }
        }
        if !found.is_empty() {
            return Some((strategy.flavor(), found));
        }
        tracing::debug!("Table strategy {} found no tables", strategy.flavor().as_str());
    }
    None
}

/// Detect tables in a PDF and convert them to [`TableBlock`]s
pub fn extract_tables(
    path: &Path,
    doc_id: &str,
    doc_type: DocumentType,
    pages: &PageSelection,
    flavors: &[TableFlavor],
) -> Result<Vec<TableBlock>> {
    let source = PdfSource::open(path)?;
    let layouts = source.layouts(pages);
    let strategies: Vec<Box<dyn TableStrategy>> = flavors.iter().copied().map(strategy_for).collect();

    let tables = match detect_tables(&layouts, &strategies) {
        Some((flavor, detected)) => to_table_blocks(doc_id, doc_type, flavor, detected),
        None => Vec::new(),
    };
    tracing::info!("Extracted {} tables from {}", tables.len(), source.file_name());
    Ok(tables)
}

/// First row becomes the header, the rest the data rows
pub fn to_table_blocks(
    doc_id: &str,
    doc_type: DocumentType,
    flavor: TableFlavor,
    detected: Vec<DetectedTable>,
) -> Vec<TableBlock> {
    detected
        .into_iter()
        .enumerate()
        .map(|(i, table)| {
            let index = i + 1;
            let whitespace = table.whitespace_ratio();
            let mut rows = table.cells.into_iter();
            let columns: Vec<String> = rows
                .next()
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.trim().to_string())
                .collect();
            let rows: Vec<Vec<String>> = rows.collect();

            let mut block = TableBlock::new(block_id("tbl", index), doc_id, table.page, columns, rows);
            block.name = Some(format!("table_{}", index));
            block.category = Some(guess_category(&block.columns));
            block.bbox = table.bbox;
            let mut extra = Extra::new();
            extra.set(Stage::Extraction, "flavor", flavor.as_str());
            extra.set(Stage::Extraction, "doc_type", doc_type.to_string());
            extra.set(Stage::Extraction, "whitespace", whitespace);
            block.extra = extra;
            block
        })
        .collect()
}

/// Coarse category from header keywords
pub fn guess_category(header: &[String]) -> TableCategory {
    let joined = header.join(" ").to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| joined.contains(k));
    if has(&["date", "วันที่"]) && has(&["amount", "ยอด", "เงิน"]) {
        TableCategory::TransactionTable
    } else if has(&["item", "description", "รายการ"]) {
        TableCategory::ItemList
    } else {
        TableCategory::GenericTable
    }
}

/// Grid reconstruction from intersecting ruling lines
pub struct StructuralLines;

impl TableStrategy for StructuralLines {
    fn flavor(&self) -> TableFlavor {
        TableFlavor::StructuralLines
    }

    fn detect(&self, page: &PageLayout) -> Result<Vec<DetectedTable>> {
        let mut tables = Vec::new();
        for component in connected_rulings(&page.rulings) {
            let xs = cluster(component.iter().filter(|r| r.is_vertical()).map(|r| r.x0));
            let ys = cluster(component.iter().filter(|r| r.is_horizontal()).map(|r| r.y0));
            if xs.len() < MIN_GRID_LINES || ys.len() < MIN_GRID_LINES {
                continue;
            }
            let bbox = [xs[0], ys[0], xs[xs.len() - 1], ys[ys.len() - 1]];
            let mut grid: Vec<Vec<Vec<&TextSpan>>> = vec![vec![Vec::new(); xs.len() - 1]; ys.len() - 1];
            for span in &page.spans {
                let (cx, cy) = span.center();
                if let (Some(col), Some(row)) = (slot(&xs, cx), slot(&ys, cy)) {
                    grid[row][col].push(span);
                }
            }
            let cells: Vec<Vec<String>> = grid
                .into_iter()
                .map(|row| row.into_iter().map(join_spans).collect())
                .collect();
            if cells.iter().flatten().all(|c| c.is_empty()) {
                continue;
            }
            tables.push(DetectedTable {
                page: page.number,
                cells,
                bbox: Some(bbox),
            });
        }
        Ok(tables)
    }
}

fn intersects(a: &Ruling, b: &Ruling) -> bool {
    let (h, v) = match (a.is_horizontal(), b.is_horizontal()) {
        (true, false) => (a, b),
        (false, true) => (b, a),
        _ => {
            // Parallel segments touch when collinear and overlapping
            let vertical = a.is_vertical() && (a.x0 - b.x0).abs() <= SNAP && a.y0 <= b.y1 + SNAP && b.y0 <= a.y1 + SNAP;
            let horizontal = a.is_horizontal() && (a.y0 - b.y0).abs() <= SNAP && a.x0 <= b.x1 + SNAP && b.x0 <= a.x1 + SNAP;
            return vertical || horizontal;
        }
    };
    v.x0 >= h.x0 - SNAP && v.x0 <= h.x1 + SNAP && h.y0 >= v.y0 - SNAP && h.y0 <= v.y1 + SNAP
}

/// Union-find over ruling intersections
fn connected_rulings(rulings: &[Ruling]) -> Vec<Vec<Ruling>> {
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut parent: Vec<usize> = (0..rulings.len()).collect();
    for i in 0..rulings.len() {
        for j in (i + 1)..rulings.len() {
            if intersects(&rulings[i], &rulings[j]) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[a] = b;
                }
            }
        }
    }

    let mut groups: std::collections::BTreeMap<usize, Vec<Ruling>> = std::collections::BTreeMap::new();
    for (i, ruling) in rulings.iter().enumerate() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(*ruling);
    }
    groups.into_values().collect()
}

/// Sorted coordinates with near-duplicates merged
fn cluster(values: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut values: Vec<f32> = values.collect();
    values.sort_by(f32::total_cmp);
    let mut out: Vec<f32> = Vec::new();
    for v in values {
        match out.last() {
            Some(last) if v - last <= SNAP => {}
            _ => out.push(v),
        }
    }
    out
}

/// Index of the interval `[edges[i], edges[i+1])` containing `v`
fn slot(edges: &[f32], v: f32) -> Option<usize> {
    edges.windows(2).position(|w| v >= w[0] && v < w[1])
}

fn join_spans(mut spans: Vec<&TextSpan>) -> String {
    spans.sort_by(|a, b| a.baseline.total_cmp(&b.baseline).then(a.x0.total_cmp(&b.x0)));
    spans
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Column projection over runs of aligned multi-fragment lines
pub struct Whitespace;

#[derive(Debug, Clone)]
struct Fragment {
    text: String,
    x0: f32,
    x1: f32,
}

impl TableStrategy for Whitespace {
    fn flavor(&self) -> TableFlavor {
        TableFlavor::Whitespace
    }

    fn detect(&self, page: &PageLayout) -> Result<Vec<DetectedTable>> {
        let lines = group_lines(&page.spans);
        let mut tables = Vec::new();
        let mut run: Vec<(Vec<Fragment>, f32, f32)> = Vec::new();

        for line in &lines {
            let fragments = fragments(&line.spans);
            let continues = run
                .last()
                .map(|(_, _, bottom)| line.top - bottom <= ROW_GAP * line.size)
                .unwrap_or(true);
            if fragments.len() >= 2 && continues {
                run.push((fragments, line.top, line.bottom));
                continue;
            }
            tables.extend(build_whitespace_table(page.number, &run));
            run.clear();
            if fragments.len() >= 2 {
                run.push((fragments, line.top, line.bottom));
            }
        }
        tables.extend(build_whitespace_table(page.number, &run));
        Ok(tables)
    }
}

fn fragments(spans: &[TextSpan]) -> Vec<Fragment> {
    let mut out: Vec<Fragment> = Vec::new();
    for span in spans {
        let text = span.text.trim();
        if text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if span.x0 - last.x1 < CELL_GAP * span.size => {
                last.text.push(' ');
                last.text.push_str(text);
                last.x1 = last.x1.max(span.x1);
            }
            _ => out.push(Fragment {
                text: text.to_string(),
                x0: span.x0,
                x1: span.x1,
            }),
        }
    }
    out
}

fn build_whitespace_table(page: u32, run: &[(Vec<Fragment>, f32, f32)]) -> Option<DetectedTable> {
    if run.len() < 2 {
        return None;
    }

    let mut intervals: Vec<(f32, f32)> = run.iter().flat_map(|(f, _, _)| f.iter().map(|f| (f.x0, f.x1))).collect();
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut columns: Vec<(f32, f32)> = Vec::new();
    for (x0, x1) in intervals {
        match columns.last_mut() {
            Some(col) if x0 <= col.1 => col.1 = col.1.max(x1),
            _ => columns.push((x0, x1)),
        }
    }
    if columns.len() < 2 {
        return None;
    }

    let cells = run
        .iter()
        .map(|(fragments, _, _)| {
            let mut row = vec![String::new(); columns.len()];
            for fragment in fragments {
                let center = (fragment.x0 + fragment.x1) / 2.0;
                if let Some(col) = columns.iter().position(|(x0, x1)| center >= *x0 && center <= *x1) {
                    if !row[col].is_empty() {
                        row[col].push(' ');
                    }
                    row[col].push_str(&fragment.text);
                }
            }
            row
        })
        .collect();

    let top = run.first().map(|(_, top, _)| *top).unwrap_or(0.0);
    let bottom = run.last().map(|(_, _, bottom)| *bottom).unwrap_or(0.0);
    Some(DetectedTable {
        page,
        cells,
        bbox: Some([columns[0].0, top, columns[columns.len() - 1].1, bottom]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ingestion::pdf::layout::tests::{build_pdf, save_pdf, text_at};
    use lopdf::content::Operation;

    fn span(text: &str, x0: f32, baseline: f32) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            x0,
            x1: x0 + text.chars().count() as f32 * 5.0,
            top: baseline - 8.0,
            bottom: baseline + 2.0,
            baseline,
            size: 10.0,
        }
    }

    fn hline(y: f32, x0: f32, x1: f32) -> Ruling {
        Ruling { x0, y0: y, x1, y1: y }
    }

    fn vline(x: f32, y0: f32, y1: f32) -> Ruling {
        Ruling { x0: x, y0, x1: x, y1 }
    }

    fn grid_page() -> PageLayout {
        PageLayout {
            number: 1,
            width: 595.0,
            height: 842.0,
            spans: vec![
                span("Date", 60.0, 115.0),
                span("Amount", 160.0, 115.0),
                span("01/01", 60.0, 135.0),
                span("100.00", 160.0, 135.0),
                span("Outside", 400.0, 300.0),
            ],
            rulings: vec![
                hline(100.0, 50.0, 250.0),
                hline(120.0, 50.0, 250.0),
                hline(140.0, 50.0, 250.0),
                vline(50.0, 100.0, 140.0),
                vline(150.0, 100.0, 140.0),
                vline(250.0, 100.0, 140.0),
            ],
            images: vec![],
        }
    }

    struct Failing;

    impl TableStrategy for Failing {
        fn flavor(&self) -> TableFlavor {
            TableFlavor::StructuralLines
        }

        fn detect(&self, _page: &PageLayout) -> Result<Vec<DetectedTable>> {
            Err(Error::internal("unsupported layout"))
        }
    }

    #[test]
    fn test_structural_lines_grid() {
        let tables = StructuralLines.detect(&grid_page()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].cells, vec![vec!["Date", "Amount"], vec!["01/01", "100.00"]]);
        assert_eq!(tables[0].bbox, Some([50.0, 100.0, 250.0, 140.0]));
    }

    #[test]
    fn test_lone_box_is_not_a_table() {
        let mut page = grid_page();
        page.rulings = vec![
            hline(100.0, 50.0, 250.0),
            hline(140.0, 50.0, 250.0),
            vline(50.0, 100.0, 140.0),
            vline(250.0, 100.0, 140.0),
        ];
        assert!(StructuralLines.detect(&page).unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_columns() {
        let page = PageLayout {
            number: 2,
            spans: vec![
                span("Heading paragraph", 50.0, 60.0),
                span("Date", 50.0, 100.0),
                span("Balance", 200.0, 100.0),
                span("02/01", 50.0, 114.0),
                span("1,200.00", 200.0, 114.0),
                span("03/01", 50.0, 128.0),
                span("900.00", 205.0, 128.0),
            ],
            ..PageLayout::default()
        };
        let tables = Whitespace.detect(&page).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 2);
        assert_eq!(
            tables[0].cells,
            vec![vec!["Date", "Balance"], vec!["02/01", "1,200.00"], vec!["03/01", "900.00"]]
        );
    }

    #[test]
    fn test_failing_strategy_is_skipped() {
        let strategies: Vec<Box<dyn TableStrategy>> = vec![Box::new(Failing), Box::new(StructuralLines)];
        let (flavor, tables) = detect_tables(&[grid_page()], &strategies).unwrap();
        assert_eq!(flavor, TableFlavor::StructuralLines);
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn test_first_productive_strategy_wins() {
        let strategies: Vec<Box<dyn TableStrategy>> = vec![Box::new(Whitespace), Box::new(StructuralLines)];
        let (flavor, _) = detect_tables(&[grid_page()], &strategies).unwrap();
        // The grid rows also align as whitespace columns
        assert_eq!(flavor, TableFlavor::Whitespace);

        let empty = PageLayout::default();
        assert!(detect_tables(&[empty], &strategies).is_none());
    }

    #[test]
    fn test_to_table_blocks_header_and_category() {
        let detected = StructuralLines.detect(&grid_page()).unwrap();
        let blocks = to_table_blocks("stmt", DocumentType::BankStatement, TableFlavor::StructuralLines, detected);
        let block = &blocks[0];
        assert_eq!(block.id, "tbl_0001");
        assert_eq!(block.name.as_deref(), Some("table_1"));
        assert_eq!(block.columns, vec!["Date", "Amount"]);
        assert_eq!(block.rows, vec![vec!["01/01", "100.00"]]);
        assert_eq!(block.category, Some(TableCategory::TransactionTable));
        assert_eq!(
            block.extra.get(Stage::Extraction, "flavor").and_then(|v| v.as_str()),
            Some("structural_lines")
        );
    }

    #[test]
    fn test_guess_category() {
        let header = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        assert_eq!(guess_category(&header(&["วันที่", "ยอดเงิน"])), TableCategory::TransactionTable);
        assert_eq!(guess_category(&header(&["Item", "Qty"])), TableCategory::ItemList);
        assert_eq!(guess_category(&header(&["Name", "Phone"])), TableCategory::GenericTable);
    }

    #[test]
    fn test_extract_tables_from_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let mut ops = Vec::new();
        for y in [700, 680, 660] {
            ops.push(Operation::new("m", vec![50.into(), y.into()]));
            ops.push(Operation::new("l", vec![250.into(), y.into()]));
        }
        for x in [50, 150, 250] {
            ops.push(Operation::new("m", vec![x.into(), 660.into()]));
            ops.push(Operation::new("l", vec![x.into(), 700.into()]));
        }
        ops.push(Operation::new("S", vec![]));
        ops.extend(text_at(60, 685, "Date"));
        ops.extend(text_at(160, 685, "Amount"));
        ops.extend(text_at(60, 665, "01/01"));
        ops.extend(text_at(160, 665, "100.00"));
        let mut doc = build_pdf(ops);
        let path = save_pdf(&mut doc, dir.path(), "grid.pdf");

        let tables = extract_tables(
            &path,
            "grid",
            DocumentType::Generic,
            &PageSelection::All,
            &[TableFlavor::StructuralLines, TableFlavor::Whitespace],
        )
        .unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].columns, vec!["Date", "Amount"]);
        assert_eq!(tables[0].rows, vec![vec!["01/01", "100.00"]]);
        assert_eq!(tables[0].page, 1);

        let none = extract_tables(&path, "grid", DocumentType::Generic, &PageSelection::Pages(vec![2]), &[TableFlavor::StructuralLines])
            .unwrap();
        assert!(none.is_empty());
    }
}
