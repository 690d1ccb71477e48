//! Font metrics and text decoding for content-stream interpretation.
//!
//! Only what glyph positioning and text recovery need: code segmentation,
//! advance widths, vertical extent and a code → Unicode mapping from the
//! font's ToUnicode CMap (falling back to lopdf's encoding tables).

use std::collections::HashMap;
use std::ops::Range;

use lopdf::{Dictionary, Document, Object};

use super::backend::decode_text_simple;

/// Width used when a simple font carries no width table, glyph units.
const DEFAULT_SIMPLE_WIDTH: f32 = 500.0;
/// Default width for CID fonts without /DW, glyph units.
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// Parsed ToUnicode CMap (`bfchar` and `bfrange` sections).
#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    map: HashMap<u32, String>,
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let mut map = HashMap::new();

        for section in sections(&text, "beginbfchar", "endbfchar") {
            for line in section.lines() {
                let tokens = hex_tokens(line);
                if let [src, dst, ..] = tokens.as_slice() {
                    if let (Some(code), Some(s)) = (parse_hex(src), utf16_hex(dst)) {
                        map.insert(code, s);
                    }
                }
            }
        }

        for section in sections(&text, "beginbfrange", "endbfrange") {
            for line in section.lines() {
                if let Some(bracket) = line.find('[') {
                    let src = hex_tokens(&line[..bracket]);
                    let dst = hex_tokens(&line[bracket..]);
                    if let [lo, hi, ..] = src.as_slice() {
                        if let (Some(lo), Some(hi)) = (parse_hex(lo), parse_hex(hi)) {
                            for (code, d) in (lo..=hi).zip(dst.iter()) {
                                if let Some(s) = utf16_hex(d) {
                                    map.insert(code, s);
                                }
                            }
                        }
                    }
                    continue;
                }

                let tokens = hex_tokens(line);
                if let [lo, hi, dst, ..] = tokens.as_slice() {
                    let (Some(lo), Some(hi)) = (parse_hex(lo), parse_hex(hi)) else {
                        continue;
                    };
                    let Some(base) = utf16_units(dst) else {
                        continue;
                    };
                    // Guard against absurd ranges in damaged CMaps
                    if hi < lo || hi - lo > 0xFFFF {
                        continue;
                    }
                    for (offset, code) in (lo..=hi).enumerate() {
                        let mut units = base.clone();
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add(offset as u16);
                        }
                        if let Ok(s) = String::from_utf16(&units) {
                            map.insert(code, s);
                        }
                    }
                }
            }
        }

        Self { map }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn sections<'t>(text: &'t str, begin: &str, end: &str) -> Vec<&'t str> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(begin) {
        let body = &rest[start + begin.len()..];
        match body.find(end) {
            Some(stop) => {
                out.push(&body[..stop]);
                rest = &body[stop + end.len()..];
            }
            None => break,
        }
    }
    out
}

fn hex_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        match rest[start + 1..].find('>') {
            Some(len) => {
                tokens.push(&rest[start + 1..start + 1 + len]);
                rest = &rest[start + 2 + len..];
            }
            None => break,
        }
    }
    tokens
}

fn parse_hex(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex.trim(), 16).ok()
}

fn utf16_units(hex: &str) -> Option<Vec<u16>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    let hex = if hex.len() == 2 { format!("00{}", hex) } else { hex };
    if hex.len() % 4 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks(4)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(|s| u16::from_str_radix(s, 16).ok())
        })
        .collect()
}

fn utf16_hex(hex: &str) -> Option<String> {
    utf16_units(hex).and_then(|units| String::from_utf16(&units).ok())
}

/// Follow a reference, returning the object itself otherwise.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up `key` in `dict`, following a reference.
pub(crate) fn get_resolved<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|o| resolve(doc, o))
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// A font as seen by the interpreter.
#[derive(Debug, Clone)]
pub struct FontInfo<'a> {
    dict: Option<&'a Dictionary>,
    /// Two-byte codes (Type0 fonts)
    pub two_byte: bool,
    to_unicode: Option<ToUnicode>,
    widths: HashMap<u32, f32>,
    default_width: f32,
    /// Ascent as a fraction of the font size
    pub ascent: f32,
    /// Descent as a fraction of the font size (negative)
    pub descent: f32,
}

impl<'a> FontInfo<'a> {
    pub fn load(doc: &'a Document, dict: &'a Dictionary) -> Self {
        let subtype = dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        let two_byte = subtype == Some(b"Type0".as_slice());

        let to_unicode = get_resolved(doc, dict, b"ToUnicode")
            .and_then(|o| o.as_stream().ok())
            .and_then(|s| s.decompressed_content().ok().or_else(|| Some(s.content.clone())))
            .map(|data| ToUnicode::parse(&data))
            .filter(|cmap| !cmap.is_empty());

        let (widths, default_width, descriptor) = if two_byte {
            let descendant = get_resolved(doc, dict, b"DescendantFonts")
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .map(|o| resolve(doc, o))
                .and_then(|o| o.as_dict().ok());
            match descendant {
                Some(cid) => (
                    cid_widths(doc, cid),
                    get_resolved(doc, cid, b"DW")
                        .and_then(number)
                        .unwrap_or(DEFAULT_CID_WIDTH),
                    get_resolved(doc, cid, b"FontDescriptor").and_then(|o| o.as_dict().ok()),
                ),
                None => (HashMap::new(), DEFAULT_CID_WIDTH, None),
            }
        } else {
            let descriptor = get_resolved(doc, dict, b"FontDescriptor").and_then(|o| o.as_dict().ok());
            let missing = descriptor
                .and_then(|d| get_resolved(doc, d, b"MissingWidth"))
                .and_then(number)
                .filter(|w| *w > 0.0)
                .unwrap_or(DEFAULT_SIMPLE_WIDTH);
            (simple_widths(doc, dict), missing, descriptor)
        };

        let metric = |key: &[u8]| {
            descriptor
                .and_then(|d| get_resolved(doc, d, key))
                .and_then(number)
                .filter(|v| *v != 0.0)
                .map(|v| v / 1000.0)
        };
        let ascent = metric(b"Ascent").unwrap_or(0.8).clamp(0.5, 1.2);
        let descent = metric(b"Descent").unwrap_or(-0.2).clamp(-0.5, 0.0);

        Self {
            dict: Some(dict),
            two_byte,
            to_unicode,
            widths,
            default_width,
            ascent,
            descent,
        }
    }

    /// Stand-in for a missing or unresolvable font resource.
    pub fn fallback() -> Self {
        Self {
            dict: None,
            two_byte: false,
            to_unicode: None,
            widths: HashMap::new(),
            default_width: DEFAULT_SIMPLE_WIDTH,
            ascent: 0.8,
            descent: -0.2,
        }
    }

    /// Split a shown string into character codes with their byte ranges.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(u32, Range<usize>)> {
        if self.two_byte {
            bytes
                .chunks(2)
                .enumerate()
                .map(|(i, c)| {
                    let code = c.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    (code, i * 2..i * 2 + c.len())
                })
                .collect()
        } else {
            bytes
                .iter()
                .enumerate()
                .map(|(i, b)| (*b as u32, i..i + 1))
                .collect()
        }
    }

    /// Advance width of `code` in glyph units (1/1000 text space).
    pub fn width(&self, code: u32) -> f32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    /// Word spacing applies to the single-byte code 32 only.
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.two_byte && code == 32
    }

    /// Unicode text of one character code.
    pub fn decode(&self, doc: &Document, code: u32, bytes: &[u8]) -> String {
        if let Some(s) = self.to_unicode.as_ref().and_then(|m| m.get(code)) {
            return s.to_string();
        }
        if let Some(dict) = self.dict {
            if let Ok(enc) = dict.get_font_encoding(doc) {
                if let Ok(text) = Document::decode_text(&enc, bytes) {
                    if !text.is_empty() {
                        return text;
                    }
                }
            }
        }
        decode_text_simple(bytes)
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary) -> HashMap<u32, f32> {
    let first = get_resolved(doc, dict, b"FirstChar")
        .and_then(number)
        .unwrap_or(0.0) as u32;
    get_resolved(doc, dict, b"Widths")
        .and_then(|o| o.as_array().ok())
        .map(|arr| {
            arr.iter()
                .enumerate()
                .filter_map(|(i, w)| number(resolve(doc, w)).map(|w| (first + i as u32, w)))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a CID font `/W` array: `c [w1 w2 …]` and `c_first c_last w` forms.
fn cid_widths(doc: &Document, cid: &Dictionary) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let Some(items) = get_resolved(doc, cid, b"W").and_then(|o| o.as_array().ok()) else {
        return widths;
    };

    let mut i = 0;
    while i < items.len() {
        let Some(start) = number(resolve(doc, &items[i])) else {
            i += 1;
            continue;
        };
        let start = start as u32;
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(start + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(end) => {
                let end = number(end).map(|e| e as u32);
                let w = items.get(i + 2).and_then(|o| number(resolve(doc, o)));
                if let (Some(end), Some(w)) = (end, w) {
                    for code in start..=end.min(start.saturating_add(0xFFFF)) {
                        widths.insert(code, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// Fonts available on a page (or form), keyed by resource name.
pub fn load_fonts<'a>(doc: &'a Document, resources: Option<&'a Dictionary>) -> HashMap<Vec<u8>, FontInfo<'a>> {
    let Some(fonts) = resources
        .and_then(|r| get_resolved(doc, r, b"Font"))
        .and_then(|o| o.as_dict().ok())
    else {
        return HashMap::new();
    };

    fonts
        .iter()
        .filter_map(|(name, obj)| {
            resolve(doc, obj)
                .as_dict()
                .ok()
                .map(|dict| (name.clone(), FontInfo::load(doc, dict)))
        })
        .collect()
}
