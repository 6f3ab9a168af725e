//! Embedded raster image extraction

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;

use super::layout::{resolve, resolve_dict, stream_bytes, PdfSource};
use crate::error::Result;
use crate::types::{block_id, Extra, ImageBlock, Stage};

/// How an image stream is written to disk
#[derive(Debug, Clone, PartialEq)]
struct Encoded {
    ext: &'static str,
    bytes: Vec<u8>,
}

/// Write every embedded image to `<output_root>/<doc_id>/images/`
///
/// Files are named `img_p<page>_<index>.<ext>` with the index counted per
/// page. Captions and categories are left empty.
pub fn extract_images(path: &Path, doc_id: &str, output_root: &Path) -> Result<Vec<ImageBlock>> {
    let source = PdfSource::open(path)?;
    let image_dir = output_root.join(doc_id).join("images");
    std::fs::create_dir_all(&image_dir)?;

    let doc = source.document();
    let mut blocks = Vec::new();

    for (page_number, page_id) in source.pages() {
        let Some(xobjects) = source
            .page_resources(page_id)
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|o| resolve_dict(doc, o))
        else {
            continue;
        };

        let placements = match source.layout(page_number, page_id) {
            Ok(layout) => layout.images,
            Err(e) => {
                tracing::debug!("No placements for page {}: {}", page_number, e);
                Vec::new()
            }
        };

        let mut page_index = 0;
        for (_, entry) in xobjects.iter() {
            let object_id = match entry {
                Object::Reference(id) => Some(*id),
                _ => None,
            };
            let Some(Object::Stream(stream)) = resolve(doc, entry) else {
                continue;
            };
            if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image") {
                continue;
            }

            page_index += 1;
            let width = dict_int(doc, &stream.dict, b"Width");
            let height = dict_int(doc, &stream.dict, b"Height");
            let filters = filters(doc, &stream.dict);
            let (color_space, components) = color_space(doc, &stream.dict);
            let encoded = encode(doc, stream, &filters, components);

            let file_name = format!("img_p{:03}_{:03}.{}", page_number, page_index, encoded.ext);
            let file_path = image_dir.join(&file_name);
            std::fs::write(&file_path, &encoded.bytes)?;

            let mut block = ImageBlock {
                id: block_id("img", blocks.len() + 1),
                doc_id: doc_id.to_string(),
                page: page_number,
                file_path: file_path.display().to_string(),
                caption: None,
                section: None,
                category: None,
                bbox: placements
                    .iter()
                    .find(|p| p.object_id.is_some() && p.object_id == object_id)
                    .map(|p| p.bbox),
                extra: Extra::new(),
            };
            block.extra.set(Stage::Extraction, "width", width);
            block.extra.set(Stage::Extraction, "height", height);
            block.extra.set(Stage::Extraction, "xref", object_id.map(xref));
            block.extra.set(Stage::Extraction, "filter", filters.last().cloned());
            block.extra.set(Stage::Extraction, "color_space", color_space);
            blocks.push(block);
        }
    }

    tracing::info!("Extracted {} images from {}", blocks.len(), source.file_name());
    Ok(blocks)
}

fn xref(id: ObjectId) -> i64 {
    i64::from(id.0)
}

fn dict_int(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key).ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Integer(v)) => Some(*v),
        Some(Object::Real(v)) => Some(*v as i64),
        _ => None,
    }
}

fn name(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

fn filters(doc: &Document, dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter").ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Some(Object::Array(items)) => items.iter().filter_map(|o| resolve(doc, o)).filter_map(name).collect(),
        _ => Vec::new(),
    }
}

/// Color space name and component count
fn color_space(doc: &Document, dict: &Dictionary) -> (Option<String>, Option<usize>) {
    let Some(cs) = dict.get(b"ColorSpace").ok().and_then(|o| resolve(doc, o)) else {
        return (None, None);
    };
    let components = |n: &str| match n {
        "DeviceGray" | "CalGray" => Some(1),
        "DeviceRGB" | "CalRGB" => Some(3),
        "DeviceCMYK" => Some(4),
        _ => None,
    };
    match cs {
        Object::Name(_) => {
            let n = name(cs);
            let count = n.as_deref().and_then(components);
            (n, count)
        }
        Object::Array(items) => {
            let family = items.first().and_then(|o| resolve(doc, o)).and_then(name);
            let count = match family.as_deref() {
                Some("ICCBased") => items
                    .get(1)
                    .and_then(|o| resolve_dict(doc, o))
                    .and_then(|d| dict_int(doc, d, b"N"))
                    .map(|n| n as usize),
                Some(other) => components(other),
                None => None,
            };
            (family, count)
        }
        _ => (None, None),
    }
}

fn encode(doc: &Document, stream: &Stream, filters: &[String], components: Option<usize>) -> Encoded {
    let raw = |ext| Encoded {
        ext,
        bytes: stream.content.clone(),
    };
    match filters {
        [only] if only == "DCTDecode" => return raw("jpg"),
        [only] if only == "JPXDecode" => return raw("jp2"),
        [only] if only == "JBIG2Decode" => return raw("jb2"),
        [only] if only == "CCITTFaxDecode" => {
            return Encoded {
                ext: "tiff",
                bytes: ccitt_tiff(doc, &stream.dict, &stream.content),
            }
        }
        [] | [_] => {}
        _ => return raw("bin"),
    }

    let width = dict_int(doc, &stream.dict, b"Width").unwrap_or(0).max(0) as usize;
    let height = dict_int(doc, &stream.dict, b"Height").unwrap_or(0).max(0) as usize;
    let bits = dict_int(doc, &stream.dict, b"BitsPerComponent").unwrap_or(8);
    let samples = stream_bytes(stream);
    let pixels = width * height;

    match (bits, components) {
        (8, Some(1)) if pixels > 0 && samples.len() >= pixels => Encoded {
            ext: "pgm",
            bytes: netpbm("P5", width, height, &samples[..pixels]),
        },
        (8, Some(3)) if pixels > 0 && samples.len() >= pixels * 3 => Encoded {
            ext: "ppm",
            bytes: netpbm("P6", width, height, &samples[..pixels * 3]),
        },
        (8, Some(4)) if pixels > 0 && samples.len() >= pixels * 4 => {
            let rgb: Vec<u8> = samples[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|px| {
                    let k = 255 - u16::from(px[3]);
                    [px[0], px[1], px[2]].map(|c| ((255 - u16::from(c)) * k / 255) as u8)
                })
                .collect();
            Encoded {
                ext: "ppm",
                bytes: netpbm("P6", width, height, &rgb),
            }
        }
        _ => Encoded {
            ext: "bin",
            bytes: samples,
        },
    }
}

fn netpbm(magic: &str, width: usize, height: usize, samples: &[u8]) -> Vec<u8> {
    let mut out = format!("{}\n{} {}\n255\n", magic, width, height).into_bytes();
    out.extend_from_slice(samples);
    out
}

/// Wrap CCITT fax data in a single-strip little-endian TIFF
fn ccitt_tiff(doc: &Document, dict: &Dictionary, data: &[u8]) -> Vec<u8> {
    let params = dict
        .get(b"DecodeParms")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| match o {
            Object::Array(items) => items.first().and_then(|i| resolve_dict(doc, i)),
            other => resolve_dict(doc, other),
        });
    let param = |key: &[u8]| params.and_then(|p| dict_int(doc, p, key));
    let k = param(b"K").unwrap_or(0);
    let width = param(b"Columns").or_else(|| dict_int(doc, dict, b"Width")).unwrap_or(1728) as u32;
    let height = param(b"Rows").or_else(|| dict_int(doc, dict, b"Height")).unwrap_or(0) as u32;
    let black_is_1 = matches!(params.and_then(|p| p.get(b"BlackIs1").ok()), Some(Object::Boolean(true)));

    let compression = if k < 0 { 4 } else { 3 };
    let mut entries: Vec<(u16, u16, u32)> = vec![
        (256, 4, width),
        (257, 4, height),
        (258, 3, 1),
        (259, 3, compression),
        (262, 3, if black_is_1 { 1 } else { 0 }),
        (273, 4, 0),
        (278, 4, height),
        (279, 4, data.len() as u32),
    ];
    if compression == 3 {
        entries.push((292, 4, if k > 0 { 1 } else { 0 }));
    }

    let data_offset = (8 + 2 + entries.len() * 12 + 4) as u32;
    let mut out = Vec::with_capacity(data_offset as usize + data.len());
    out.extend_from_slice(b"II*\0");
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, value) in entries {
        let value = if tag == 273 { data_offset } else { value };
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(data);
    out
}
