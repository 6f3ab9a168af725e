//! Page geometry recovered from PDF content streams
//!
//! Interprets the subset of content-stream operators needed to place text
//! spans, ruling lines and image XObjects on the page. Coordinates in the
//! resulting [`PageLayout`] are PDF points with a top-left origin.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::fonts::FontDecoder;
use crate::error::{Error, Result};
use crate::types::BBox;

const MAX_FORM_DEPTH: usize = 8;
const AXIS_TOLERANCE: f32 = 1.0;
const MIN_RULING_LENGTH: f32 = 3.0;
const THIN_RECT: f32 = 2.0;

/// 2D affine matrix `[a b c d e f]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix(pub [f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn vertical_scale(&self) -> f32 {
        let [_, _, c, d, _, _] = self.0;
        (c * c + d * d).sqrt()
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        let mut m = [0.0f32; 6];
        for (slot, operand) in m.iter_mut().zip(operands) {
            *slot = number(operand)?;
        }
        Some(Matrix(m))
    }
}

/// A run of text drawn by one show-text operator
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
    /// Baseline, top-left origin
    pub baseline: f32,
    pub size: f32,
}

impl TextSpan {
    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }
}

/// Axis-aligned stroked or filled line segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Ruling {
    pub fn is_horizontal(&self) -> bool {
        (self.y0 - self.y1).abs() <= AXIS_TOLERANCE
    }

    pub fn is_vertical(&self) -> bool {
        (self.x0 - self.x1).abs() <= AXIS_TOLERANCE
    }
}

/// An image XObject drawn on the page
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    pub object_id: Option<ObjectId>,
    pub bbox: BBox,
}

/// Everything the extractors need to know about one page
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub number: u32,
    pub width: f32,
    pub height: f32,
    pub spans: Vec<TextSpan>,
    pub rulings: Vec<Ruling>,
    pub images: Vec<ImagePlacement>,
}

/// An opened PDF
pub struct PdfSource {
    doc: Document,
    path: PathBuf,
}

impl PdfSource {
    /// Open a PDF; missing or corrupt files are fatal
    pub fn open(path: &Path) -> Result<Self> {
        let name = file_name(path);
        if !path.is_file() {
            return Err(Error::file_parse(name, "file not found"));
        }
        let doc = Document::load(path).map_err(|e| Error::file_parse(name, e.to_string()))?;
        Ok(Self {
            doc,
            path: path.to_path_buf(),
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        file_name(&self.path)
    }

    /// Page number (1-indexed) to page object id
    pub fn pages(&self) -> BTreeMap<u32, ObjectId> {
        self.doc.get_pages()
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Resources dictionary of a page, following `Parent` inheritance
    pub fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        self.inherited(page_id, b"Resources").and_then(|o| resolve_dict(&self.doc, o))
    }

    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok();
        let mut seen = HashSet::new();
        while let Some(dict) = current {
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) if seen.insert(*parent) => self.doc.get_dictionary(*parent).ok(),
                _ => None,
            };
        }
        None
    }

    /// Interpret one page's content stream
    pub fn layout(&self, number: u32, page_id: ObjectId) -> Result<PageLayout> {
        let media_box = self
            .inherited(page_id, b"MediaBox")
            .and_then(|o| resolve(&self.doc, o))
            .and_then(rect)
            .unwrap_or([0.0, 0.0, 612.0, 792.0]);

        let content = self.doc.get_page_content(page_id)?;
        let operations = Content::decode(&content)?.operations;

        let mut interpreter = Interpreter::new(&self.doc, media_box);
        let fonts = interpreter.fonts_for(self.page_resources(page_id));
        interpreter.run(&operations, self.page_resources(page_id), &fonts, 0);

        Ok(PageLayout {
            number,
            width: media_box[2] - media_box[0],
            height: media_box[3] - media_box[1],
            spans: interpreter.spans,
            rulings: interpreter.rulings,
            images: interpreter.images,
        })
    }

    /// Layouts for the selected pages; pages that fail to decode are skipped
    pub fn layouts(&self, selection: &super::PageSelection) -> Vec<PageLayout> {
        self.pages()
            .into_iter()
            .filter(|(number, _)| selection.contains(*number))
            .filter_map(|(number, page_id)| match self.layout(number, page_id) {
                Ok(layout) => Some(layout),
                Err(e) => {
                    tracing::warn!("Skipping page {} of {}: {}", number, self.file_name(), e);
                    None
                }
            })
            .collect()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    media_box: [f32; 4],
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    path: Vec<Ruling>,
    current_point: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
    visited_forms: HashSet<ObjectId>,
    spans: Vec<TextSpan>,
    rulings: Vec<Ruling>,
    images: Vec<ImagePlacement>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, media_box: [f32; 4]) -> Self {
        Self {
            doc,
            media_box,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            path: Vec::new(),
            current_point: None,
            subpath_start: None,
            visited_forms: HashSet::new(),
            spans: Vec::new(),
            rulings: Vec::new(),
            images: Vec::new(),
        }
    }

    fn fonts_for(&self, resources: Option<&Dictionary>) -> HashMap<Vec<u8>, FontDecoder> {
        let mut fonts = HashMap::new();
        let Some(font_dict) = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|o| resolve_dict(self.doc, o))
        else {
            return fonts;
        };
        for (name, font) in font_dict.iter() {
            if let Some(font) = resolve_dict(self.doc, font) {
                fonts.insert(name.clone(), FontDecoder::from_dict(self.doc, font));
            }
        }
        fonts
    }

    /// Device space (bottom-left) to page space (top-left)
    fn to_page(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.media_box[0], self.media_box[3] - y)
    }

    fn run(
        &mut self,
        operations: &[lopdf::content::Operation],
        resources: Option<&Dictionary>,
        fonts: &HashMap<Vec<u8>, FontDecoder>,
        depth: usize,
    ) {
        for op in operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(number).unwrap_or(0.0);
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.state.ctm = m.multiply(&self.state.ctm);
                    }
                }
                "BT" => {
                    self.text_matrix = Matrix::IDENTITY;
                    self.line_matrix = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.state.font = Some(name.clone());
                    }
                    self.state.font_size = num(1);
                }
                "Tc" => self.state.char_spacing = num(0),
                "Tw" => self.state.word_spacing = num(0),
                "Tz" => self.state.horizontal_scale = num(0) / 100.0,
                "TL" => self.state.leading = num(0),
                "Ts" => self.state.rise = num(0),
                "Td" => self.move_line(num(0), num(1)),
                "TD" => {
                    self.state.leading = -num(1);
                    self.move_line(num(0), num(1));
                }
                "T*" => self.move_line(0.0, -self.state.leading),
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.text_matrix = m;
                        self.line_matrix = m;
                    }
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&[ShowItem::Text(bytes)], fonts);
                    }
                }
                "'" => {
                    self.move_line(0.0, -self.state.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&[ShowItem::Text(bytes)], fonts);
                    }
                }
                "\"" => {
                    self.state.word_spacing = num(0);
                    self.state.char_spacing = num(1);
                    self.move_line(0.0, -self.state.leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(&[ShowItem::Text(bytes)], fonts);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let items: Vec<ShowItem> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(ShowItem::Text(bytes)),
                                other => number(other).map(ShowItem::Adjust),
                            })
                            .collect();
                        self.show(&items, fonts);
                    }
                }
                "m" => {
                    let p = self.state.ctm.apply(num(0), num(1));
                    self.current_point = Some(p);
                    self.subpath_start = Some(p);
                }
                "l" => {
                    let p = self.state.ctm.apply(num(0), num(1));
                    if let Some(from) = self.current_point {
                        self.push_segment(from, p);
                    }
                    self.current_point = Some(p);
                }
                "h" => {
                    if let (Some(from), Some(start)) = (self.current_point, self.subpath_start) {
                        self.push_segment(from, start);
                    }
                    self.current_point = self.subpath_start;
                }
                "re" => self.push_rect(num(0), num(1), num(2), num(3)),
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    let segments = std::mem::take(&mut self.path);
                    self.rulings.extend(segments);
                    self.current_point = None;
                }
                "n" => {
                    self.path.clear();
                    self.current_point = None;
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.draw_xobject(name, resources, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn show(&mut self, items: &[ShowItem<'_>], fonts: &HashMap<Vec<u8>, FontDecoder>) {
        let fallback = FontDecoder::default();
        let decoder = self
            .state
            .font
            .as_ref()
            .and_then(|name| fonts.get(name))
            .unwrap_or(&fallback);
        let size = self.state.font_size;
        let scale = self.state.horizontal_scale;

        let start = Matrix([size * scale, 0.0, 0.0, size, 0.0, self.state.rise])
            .multiply(&self.text_matrix)
            .multiply(&self.state.ctm);
        let mut text = String::new();
        let mut advance = 0.0f32;

        for item in items {
            match item {
                ShowItem::Text(bytes) => {
                    text.push_str(&decoder.decode(bytes));
                    let (width, spaces) = decoder.advance(bytes);
                    let glyphs = decoder.glyph_count(bytes) as f32;
                    advance += (width / 1000.0 * size
                        + glyphs * self.state.char_spacing
                        + spaces as f32 * self.state.word_spacing)
                        * scale;
                }
                ShowItem::Adjust(adjust) => {
                    // Large negative kerning separates words in justified text
                    if *adjust < -250.0 && !text.ends_with(' ') && !text.is_empty() {
                        text.push(' ');
                    }
                    advance -= adjust / 1000.0 * size * scale;
                }
            }
        }

        let end = Matrix::translate(advance, 0.0)
            .multiply(&self.text_matrix)
            .multiply(&self.state.ctm);
        self.text_matrix = Matrix::translate(advance, 0.0).multiply(&self.text_matrix);

        if text.trim().is_empty() {
            return;
        }

        let rendered_size = start.vertical_scale().max(1.0);
        let (sx, sy) = self.to_page(start.0[4], start.0[5]);
        let (ex, _) = self.to_page(end.0[4], end.0[5]);
        self.spans.push(TextSpan {
            text,
            x0: sx.min(ex),
            x1: sx.max(ex),
            top: sy - rendered_size * 0.8,
            bottom: sy + rendered_size * 0.2,
            baseline: sy,
            size: rendered_size,
        });
    }

    fn push_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let (x0, y0) = self.to_page(from.0, from.1);
        let (x1, y1) = self.to_page(to.0, to.1);
        let ruling = Ruling {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        };
        let long_enough = (ruling.x1 - ruling.x0).max(ruling.y1 - ruling.y0) >= MIN_RULING_LENGTH;
        if long_enough && (ruling.is_horizontal() || ruling.is_vertical()) {
            self.path.push(ruling);
        }
    }

    fn push_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let ctm = self.state.ctm;
        let corners = [ctm.apply(x, y), ctm.apply(x + w, y), ctm.apply(x + w, y + h), ctm.apply(x, y + h)];
        let (min_x, max_x) = corners.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.0), hi.max(p.0)));
        let (min_y, max_y) = corners.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));

        if max_y - min_y <= THIN_RECT {
            let mid = (min_y + max_y) / 2.0;
            self.push_segment((min_x, mid), (max_x, mid));
        } else if max_x - min_x <= THIN_RECT {
            let mid = (min_x + max_x) / 2.0;
            self.push_segment((mid, min_y), (mid, max_y));
        } else {
            self.push_segment((min_x, min_y), (max_x, min_y));
            self.push_segment((max_x, min_y), (max_x, max_y));
            self.push_segment((max_x, max_y), (min_x, max_y));
            self.push_segment((min_x, max_y), (min_x, min_y));
        }
        self.current_point = Some(corners[0]);
        self.subpath_start = Some(corners[0]);
    }

    fn draw_xobject(&mut self, name: &[u8], resources: Option<&Dictionary>, depth: usize) {
        let doc = self.doc;
        let Some(entry) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|o| resolve_dict(doc, o))
            .and_then(|xobjects| xobjects.get(name).ok())
        else {
            return;
        };
        let object_id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let Some(Object::Stream(stream)) = resolve(doc, entry) else {
            return;
        };

        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(subtype)) if subtype == b"Image" => {
                let ctm = self.state.ctm;
                let corners = [ctm.apply(0.0, 0.0), ctm.apply(1.0, 0.0), ctm.apply(1.0, 1.0), ctm.apply(0.0, 1.0)];
                let points: Vec<(f32, f32)> = corners.iter().map(|(x, y)| self.to_page(*x, *y)).collect();
                let (x0, x1) = points.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.0), hi.max(p.0)));
                let (y0, y1) = points.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));
                self.images.push(ImagePlacement {
                    object_id,
                    bbox: [x0, y0, x1, y1],
                });
            }
            Ok(Object::Name(subtype)) if subtype == b"Form" => {
                if depth >= MAX_FORM_DEPTH {
                    return;
                }
                if let Some(id) = object_id {
                    if !self.visited_forms.insert(id) {
                        return;
                    }
                }
                let Ok(content) = Content::decode(&stream_bytes(stream)) else {
                    tracing::debug!("Undecodable form XObject {:?}", object_id);
                    return;
                };
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve_dict(doc, o))
                    .or(resources);
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| match o {
                        Object::Array(values) => Matrix::from_operands(values),
                        _ => None,
                    })
                    .unwrap_or(Matrix::IDENTITY);

                let fonts = self.fonts_for(form_resources);
                let saved = self.state.clone();
                let saved_stack = self.stack.len();
                self.state.ctm = form_matrix.multiply(&self.state.ctm);
                self.run(&content.operations, form_resources, &fonts, depth + 1);
                self.stack.truncate(saved_stack);
                self.state = saved;
                if let Some(id) = object_id {
                    self.visited_forms.remove(&id);
                }
            }
            _ => {}
        }
    }
}

enum ShowItem<'b> {
    Text(&'b [u8]),
    Adjust(f32),
}

/// Integer or real operand as f32
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Follow one level of indirection
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resolve to a dictionary (a stream resolves to its dictionary)
pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Decoded stream bytes, raw when no filter applies
pub(crate) fn stream_bytes(stream: &lopdf::Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

fn rect(obj: &Object) -> Option<[f32; 4]> {
    match obj {
        Object::Array(values) if values.len() == 4 => {
            let v: Vec<f32> = values.iter().filter_map(number).collect();
            (v.len() == 4).then(|| [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])])
        }
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    /// Build a single-page PDF from raw content operations
    pub(crate) fn build_pdf(operations: Vec<Operation>) -> Document {
        build_pdf_with(operations, |_| Dictionary::new())
    }

    /// Like [`build_pdf`], with an `XObject` resource dictionary
    pub(crate) fn build_pdf_with(
        operations: Vec<Operation>,
        xobjects: impl FnOnce(&mut Document) -> Dictionary,
    ) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let xobjects = xobjects(&mut doc);
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => xobjects,
        });
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// Operations drawing `text` at (x, y) in PDF user space, 10pt
    pub(crate) fn text_at(x: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    pub(crate) fn save_pdf(doc: &mut Document, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }

    #[test]
    fn test_matrix_multiply_translate() {
        let m = Matrix::translate(10.0, 20.0).multiply(&Matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]));
        assert_eq!(m.apply(1.0, 1.0), (22.0, 42.0));
    }

    #[test]
    fn test_open_missing_file_is_fatal() {
        let err = PdfSource::open(Path::new("/nonexistent/statement.pdf")).err().unwrap();
        assert!(matches!(err, Error::FileParse { .. }));
    }

    #[test]
    fn test_layout_places_text_and_rulings() {
        let dir = tempfile::tempdir().unwrap();
        let mut ops = text_at(72, 742, "Account Statement");
        ops.push(Operation::new("re", vec![50.into(), 500.into(), 300.into(), 1.into()]));
        ops.push(Operation::new("f", vec![]));
        let mut doc = build_pdf(ops);
        let path = save_pdf(&mut doc, dir.path(), "layout.pdf");

        let source = PdfSource::open(&path).unwrap();
        assert_eq!(source.page_count(), 1);
        let (number, page_id) = source.pages().into_iter().next().unwrap();
        let layout = source.layout(number, page_id).unwrap();

        assert_eq!(layout.height, 842.0);
        assert_eq!(layout.spans.len(), 1);
        let span = &layout.spans[0];
        assert_eq!(span.text, "Account Statement");
        assert!((span.x0 - 72.0).abs() < 0.01);
        assert!((span.baseline - 100.0).abs() < 0.01);
        assert!(span.x1 > span.x0);

        assert_eq!(layout.rulings.len(), 1);
        assert!(layout.rulings[0].is_horizontal());
    }
}
