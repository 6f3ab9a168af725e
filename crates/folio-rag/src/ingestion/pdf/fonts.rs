//! Font-aware decoding of PDF string operands
//!
//! Resolves the `ToUnicode` CMap when a font carries one, and glyph widths
//! from `Widths` (simple fonts) or `W`/`DW` (composite fonts) for span geometry.

use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

use super::layout::{number, resolve, resolve_dict, stream_bytes};

const DEFAULT_WIDTH: f32 = 500.0;
const MAX_RANGE: u32 = 0xFFFF;

/// Decoder for one font resource
#[derive(Debug, Clone)]
pub(crate) struct FontDecoder {
    code_bytes: usize,
    to_unicode: HashMap<u32, String>,
    widths: HashMap<u32, f32>,
    default_width: f32,
}

impl Default for FontDecoder {
    fn default() -> Self {
        Self {
            code_bytes: 1,
            to_unicode: HashMap::new(),
            widths: HashMap::new(),
            default_width: DEFAULT_WIDTH,
        }
    }
}

impl FontDecoder {
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let composite = matches!(font.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Type0");
        let mut decoder = Self {
            code_bytes: if composite { 2 } else { 1 },
            ..Self::default()
        };

        if let Some(Object::Stream(stream)) = font.get(b"ToUnicode").ok().and_then(|o| resolve(doc, o)) {
            let (map, width) = parse_to_unicode(&stream_bytes(stream));
            decoder.to_unicode = map;
            if !composite {
                if let Some(width) = width {
                    decoder.code_bytes = width;
                }
            }
        }

        if composite {
            decoder.load_cid_widths(doc, font);
        } else {
            decoder.load_simple_widths(doc, font);
        }
        decoder
    }

    fn load_simple_widths(&mut self, doc: &Document, font: &Dictionary) {
        let first = font.get(b"FirstChar").ok().and_then(number).unwrap_or(0.0) as u32;
        if let Some(Object::Array(widths)) = font.get(b"Widths").ok().and_then(|o| resolve(doc, o)) {
            for (offset, width) in widths.iter().enumerate() {
                if let Some(w) = resolve(doc, width).and_then(number) {
                    self.widths.insert(first + offset as u32, w);
                }
            }
        }
    }

    fn load_cid_widths(&mut self, doc: &Document, font: &Dictionary) {
        self.default_width = 1000.0;
        let descendant = match font.get(b"DescendantFonts").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Array(fonts)) => fonts.first().and_then(|f| resolve_dict(doc, f)),
            _ => None,
        };
        let Some(descendant) = descendant else {
            return;
        };
        if let Some(dw) = descendant.get(b"DW").ok().and_then(number) {
            self.default_width = dw;
        }
        let Some(Object::Array(w)) = descendant.get(b"W").ok().and_then(|o| resolve(doc, o)) else {
            return;
        };

        // Entries are either `c [w1 w2 ...]` or `c_first c_last w`
        let mut i = 0;
        while i < w.len() {
            let Some(start) = resolve(doc, &w[i]).and_then(number) else {
                break;
            };
            match w.get(i + 1).and_then(|o| resolve(doc, o)) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = number(width) {
                            self.widths.insert(start as u32 + offset as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let end = number(end).unwrap_or(start);
                    let width = w.get(i + 2).and_then(number).unwrap_or(self.default_width);
                    let (start, end) = (start as u32, end as u32);
                    if end >= start && end - start <= MAX_RANGE {
                        for code in start..=end {
                            self.widths.insert(code, width);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    fn codes<'a>(&self, bytes: &'a [u8]) -> impl Iterator<Item = u32> + 'a {
        let step = self.code_bytes.max(1);
        bytes
            .chunks(step)
            .map(|chunk| chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
    }

    /// Decode a string operand to Unicode text
    pub fn decode(&self, bytes: &[u8]) -> String {
        if self.to_unicode.is_empty() {
            if bytes.starts_with(&[0xFE, 0xFF]) {
                return decode_utf16be(&bytes[2..]);
            }
            if self.code_bytes == 2 {
                // Identity-encoded glyph ids without a ToUnicode map carry no text
                return String::new();
            }
            return bytes.iter().map(|b| latin1(*b)).collect();
        }

        let mut out = String::new();
        for code in self.codes(bytes) {
            match self.to_unicode.get(&code) {
                Some(text) => out.push_str(text),
                None if self.code_bytes == 1 => out.push(latin1(code as u8)),
                None => {}
            }
        }
        out
    }

    /// Total glyph advance in text-space units (1/1000 em) and the number of single-byte spaces
    pub fn advance(&self, bytes: &[u8]) -> (f32, usize) {
        let mut width = 0.0;
        let mut spaces = 0;
        for code in self.codes(bytes) {
            width += self.widths.get(&code).copied().unwrap_or(self.default_width);
            if self.code_bytes == 1 && code == 32 {
                spaces += 1;
            }
        }
        (width, spaces)
    }

    pub fn glyph_count(&self, bytes: &[u8]) -> usize {
        bytes.len().div_ceil(self.code_bytes.max(1))
    }
}

fn latin1(b: u8) -> char {
    match b {
        0x91 | 0x92 => '\'',
        0x93 | 0x94 => '"',
        0x96 | 0x97 => '-',
        _ => char::from(b),
    }
}

fn decode_utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[derive(Debug, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Word(String),
    ArrayStart,
    ArrayEnd,
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let c = data[i];
        match c {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = data[start..].iter().position(|b| *b == b'>').map(|p| start + p).unwrap_or(data.len());
                tokens.push(Token::Hex(parse_hex(&data[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings only appear in the CMap header
                let mut depth = 0;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'>' | b'[' | b']' | b'(' | b'%')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(Token::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn parse_hex(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter_map(|b| (*b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

/// Parse a ToUnicode CMap; returns the code map and the source code width in bytes
pub(crate) fn parse_to_unicode(data: &[u8]) -> (HashMap<u32, String>, Option<usize>) {
    let tokens = tokenize(data);
    let mut map = HashMap::new();
    let mut code_width = None;
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Word(w) if w == "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (Token::Hex(src), Token::Hex(dst)) => {
                            code_width.get_or_insert(src.len());
                            map.insert(code_of(src), decode_utf16be(dst));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            Token::Word(w) if w == "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (Token::Hex(lo), Token::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                        break;
                    };
                    code_width.get_or_insert(lo.len());
                    let (lo_code, hi_code) = (code_of(lo), code_of(hi));
                    if hi_code < lo_code || hi_code - lo_code > MAX_RANGE {
                        i += 3;
                        continue;
                    }
                    match &tokens[i + 2] {
                        Token::Hex(dst) => {
                            for (offset, code) in (lo_code..=hi_code).enumerate() {
                                map.insert(code, increment_utf16(dst, offset as u32));
                            }
                            i += 3;
                        }
                        Token::ArrayStart => {
                            let mut j = i + 3;
                            let mut code = lo_code;
                            while let Some(Token::Hex(dst)) = tokens.get(j) {
                                if code <= hi_code {
                                    map.insert(code, decode_utf16be(dst));
                                }
                                code += 1;
                                j += 1;
                            }
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }

    (map, code_width)
}

fn increment_utf16(dst: &[u8], offset: u32) -> String {
    let mut units: Vec<u16> = dst
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}
