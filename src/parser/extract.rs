//! Page layout extraction: words, image placements and gridlines.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use unicode_normalization::UnicodeNormalization;

use super::fonts::{get_resolved, number};
use super::interpreter::{ContentVisitor, Interpreter, Matrix, ShowText, UserBox};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::model::{ImageBlock, PageLayout, Rule, TextSource, Word};

/// Horizontal gap between glyphs that still belongs to one word, points.
const X_TOLERANCE: f32 = 3.0;
/// Vertical drift between glyphs that still belongs to one word, points.
const Y_TOLERANCE: f32 = 3.0;
/// Rules closer than this, with overlapping extents, are merged.
const RULE_MERGE_DISTANCE: f32 = 0.3;

/// Mapping between PDF user space and top-left page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// MediaBox left edge
    pub origin_x: f32,
    /// MediaBox top edge
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    /// Read the (possibly inherited) MediaBox of a page. Defaults to A4.
    pub fn of(doc: &Document, page_id: ObjectId) -> Self {
        let media_box = inherited(doc, page_id, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .map(|a| a.iter().filter_map(number).collect::<Vec<_>>())
            .filter(|v| v.len() == 4);

        match media_box {
            Some(v) => {
                let (x0, x1) = (v[0].min(v[2]), v[0].max(v[2]));
                let (y0, y1) = (v[1].min(v[3]), v[1].max(v[3]));
                Self {
                    origin_x: x0,
                    top: y1,
                    width: x1 - x0,
                    height: y1 - y0,
                }
            }
            None => Self {
                origin_x: 0.0,
                top: 842.0,
                width: 595.0,
                height: 842.0,
            },
        }
    }

    pub fn to_page(&self, b: &UserBox) -> Rect {
        Rect::new(
            b.x0 - self.origin_x,
            self.top - b.y1,
            b.x1 - self.origin_x,
            self.top - b.y0,
        )
    }

    pub fn to_user(&self, r: &Rect) -> UserBox {
        UserBox::new(
            r.x0 + self.origin_x,
            self.top - r.y1,
            r.x1 + self.origin_x,
            self.top - r.y0,
        )
    }
}

/// Look up a page attribute, walking up the page tree.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    // Page trees deeper than this are malformed
    for _ in 0..32 {
        if let Some(value) = get_resolved(doc, dict, key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The page's resource dictionary, inherited from the page tree if needed.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok())
}

/// Concatenated, decompressed content of a page.
pub fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::PdfParse(e.to_string()))?;

    let contents = match page_dict.get(b"Contents") {
        Ok(contents) => contents,
        // A page without content is blank
        Err(_) => return Ok(Vec::new()),
    };

    let streams: Vec<&Object> = match contents {
        Object::Reference(r) => match doc.get_object(*r) {
            Ok(Object::Array(arr)) => arr.iter().collect(),
            Ok(obj) => vec![obj],
            Err(e) => return Err(Error::PdfParse(e.to_string())),
        },
        Object::Array(arr) => arr.iter().collect(),
        _ => return Err(Error::PdfParse("Invalid content stream".to_string())),
    };

    let mut content = Vec::new();
    for obj in streams {
        let obj = match obj {
            Object::Reference(r) => doc.get_object(*r).map_err(|e| Error::PdfParse(e.to_string()))?,
            other => other,
        };
        let stream = obj
            .as_stream()
            .map_err(|_| Error::PdfParse("Invalid content stream".to_string()))?;
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        content.extend_from_slice(&data);
        content.push(b'\n');
    }
    Ok(content)
}

/// Decode a page's content into operations.
pub fn page_operations(doc: &Document, page_id: ObjectId) -> Result<Vec<lopdf::content::Operation>> {
    let content = page_content(doc, page_id)?;
    Content::decode(&content)
        .map(|c| c.operations)
        .map_err(|e| Error::PdfParse(e.to_string()))
}

struct PositionedGlyph {
    text: String,
    bbox: UserBox,
}

#[derive(Default)]
struct LayoutCollector {
    glyphs: Vec<PositionedGlyph>,
    images: Vec<(Vec<u8>, UserBox)>,
    rules: Vec<(f32, f32, f32)>,
}

impl ContentVisitor for LayoutCollector {
    fn enters_forms(&self) -> bool {
        true
    }

    fn on_text(&mut self, text: &ShowText) {
        for glyph in text.glyphs() {
            self.glyphs.push(PositionedGlyph {
                text: glyph.text.clone(),
                bbox: glyph.bbox,
            });
        }
    }

    fn on_image(&mut self, _op_index: usize, name: &[u8], placement: &Matrix) {
        self.images
            .push((name.to_vec(), placement.transform_box(0.0, 0.0, 1.0, 1.0)));
    }

    fn on_rule(&mut self, y: f32, x0: f32, x1: f32) {
        self.rules.push((y, x0, x1));
    }
}

/// Extract the layout of one page.
pub fn extract_layout(doc: &Document, index: usize, page_id: ObjectId) -> Result<PageLayout> {
    let geometry = PageGeometry::of(doc, page_id);
    let ops = page_operations(doc, page_id)?;

    let mut collector = LayoutCollector::default();
    Interpreter::new(doc, page_resources(doc, page_id)).run(&ops, &mut collector);

    let words = group_glyphs(&collector.glyphs, &geometry);
    let images = collector
        .images
        .iter()
        .map(|(name, b)| ImageBlock {
            bbox: geometry.to_page(b),
            name: Some(String::from_utf8_lossy(name).into_owned()),
        })
        .collect();
    let rules = merge_rules(
        collector
            .rules
            .iter()
            .map(|&(y, x0, x1)| Rule::new(geometry.top - y, x0 - geometry.origin_x, x1 - geometry.origin_x))
            .collect(),
    );

    log::debug!(
        "page {}: {} words, {} images, {} rules",
        index + 1,
        words.len(),
        collector.images.len(),
        rules.len()
    );

    Ok(PageLayout::new(index, geometry.width, geometry.height)
        .with_words(words)
        .with_images(images)
        .with_rules(rules)
        .with_source(TextSource::Digital))
}

/// Join consecutive glyphs into words, breaking on whitespace, line changes
/// and horizontal gaps.
fn group_glyphs(glyphs: &[PositionedGlyph], geometry: &PageGeometry) -> Vec<Word> {
    let mut words = Vec::new();
    let mut text = String::new();
    let mut bbox: Option<Rect> = None;

    let flush = |text: &mut String, bbox: &mut Option<Rect>, words: &mut Vec<Word>| {
        if let Some(b) = bbox.take() {
            let normalized: String = text.nfc().collect();
            if !normalized.trim().is_empty() {
                words.push(Word::new(normalized.trim(), b));
            }
        }
        text.clear();
    };

    for glyph in glyphs {
        let rect = geometry.to_page(&glyph.bbox);
        if glyph.text.chars().all(char::is_whitespace) {
            flush(&mut text, &mut bbox, &mut words);
            continue;
        }

        if let Some(current) = bbox {
            let same_line = (rect.center_y() - current.center_y()).abs() <= Y_TOLERANCE;
            let adjacent = rect.x0 >= current.x1 - X_TOLERANCE && rect.x0 - current.x1 <= X_TOLERANCE;
            if !same_line || !adjacent {
                flush(&mut text, &mut bbox, &mut words);
            }
        }

        text.push_str(&glyph.text);
        bbox = Some(match bbox {
            Some(current) => current.union(&rect),
            None => rect,
        });
    }
    flush(&mut text, &mut bbox, &mut words);
    words
}

/// Merge collinear overlapping rules (a stroked rectangle and its fill, or
/// a gridline drawn in segments).
fn merge_rules(mut rules: Vec<Rule>) -> Vec<Rule> {
    rules.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x0.total_cmp(&b.x0)));
    let mut merged: Vec<Rule> = Vec::with_capacity(rules.len());
    for rule in rules {
        if let Some(last) = merged.last_mut() {
            if (last.y - rule.y).abs() <= RULE_MERGE_DISTANCE && rule.x0 <= last.x1 {
                last.x1 = last.x1.max(rule.x1);
                continue;
            }
        }
        merged.push(rule);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn single_page(content: &str, media_box: [i64; 4]) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => Object::Integer(1),
                "MediaBox" => media_box.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }),
        );
        (doc, page_id)
    }

    #[test]
    fn test_words_and_inherited_attributes() {
        let (doc, page_id) = single_page(
            "BT /F1 10 Tf 100 800 Td (Name: Kim) Tj ET 0.5 w 50 780 m 550 780 l S",
            [0, 0, 595, 842],
        );
        let page = extract_layout(&doc, 0, page_id).unwrap();

        let texts: Vec<&str> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Name:", "Kim"]);
        let first = &page.words[0].bbox;
        assert!((first.y1 - 44.0).abs() < 0.5);
        assert_eq!(page.rules, vec![Rule::new(62.0, 50.0, 550.0)]);
        assert_eq!((page.width, page.height), (595.0, 842.0));
    }

    #[test]
    fn test_separate_runs_split_words() {
        let (doc, page_id) = single_page(
            "BT /F1 10 Tf 100 800 Td (AB) Tj 40 0 Td (CD) Tj 0 -20 Td (EF) Tj ET",
            [0, 0, 595, 842],
        );
        let page = extract_layout(&doc, 0, page_id).unwrap();
        let texts: Vec<&str> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["AB", "CD", "EF"]);
    }

    #[test]
    fn test_text_and_rules_inside_forms() {
        let (mut doc, page_id) = single_page("q 1 0 0 1 0 -100 cm /Fm0 Do Q", [0, 0, 595, 842]);
        let form = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => [0, 0, 595, 842].map(Object::Integer).to_vec(),
            },
            b"BT /F1 10 Tf 100 800 Td (Kim) Tj ET 0.5 w 50 780 m 550 780 l S".to_vec(),
        ));
        let pages_id = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Parent")
            .unwrap()
            .as_reference()
            .unwrap();
        let pages = doc.get_dictionary_mut(pages_id).unwrap();
        let resources = pages.get_mut(b"Resources").unwrap().as_dict_mut().unwrap();
        resources.set("XObject", dictionary! { "Fm0" => form });

        let page = extract_layout(&doc, 0, page_id).unwrap();
        let texts: Vec<&str> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Kim"]);
        assert!((page.words[0].bbox.y1 - 144.0).abs() < 0.5);
        assert_eq!(page.rules, vec![Rule::new(162.0, 50.0, 550.0)]);
    }

    #[test]
    fn test_geometry_roundtrip_with_offset_media_box() {
        let (doc, page_id) = single_page("", [10, 20, 605, 862]);
        let geometry = PageGeometry::of(&doc, page_id);
        assert_eq!(geometry.width, 595.0);
        let r = Rect::new(5.0, 10.0, 50.0, 30.0);
        assert_eq!(geometry.to_page(&geometry.to_user(&r)), r);
    }

    #[test]
    fn test_merge_rules() {
        let merged = merge_rules(vec![
            Rule::new(100.0, 50.0, 200.0),
            Rule::new(100.1, 190.0, 300.0),
            Rule::new(150.0, 50.0, 300.0),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].x1, 300.0);
    }
}
