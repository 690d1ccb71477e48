//! The destructive blank-out primitive.
//!
//! Applying a set of rectangles to a page rewrites its content once:
//!
//! - glyphs whose centers fall inside a rectangle are cut out of their
//!   text-showing operator and replaced by an equal `TJ` displacement, so
//!   the surviving glyphs stay where they were;
//! - image and form draws completely inside a rectangle are removed;
//! - partially covered images get the covered pixels whitened, and
//!   partially covered forms get their own content rewritten the same way,
//!   both in copies private to the page;
//! - the original content is wrapped in `q … Q` and opaque white fills are
//!   painted over every rectangle.
//!
//! Path construction and painting operators are left untouched, so table
//! gridlines survive.

use std::collections::{HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::extract::{page_operations, page_resources, PageGeometry};
use super::fonts::get_resolved;
use super::images::blank_image;
use super::interpreter::{
    form_operations, form_resources, ContentVisitor, FormPlacement, Glyph, Interpreter, Matrix, ShowText,
    TextElement, UserBox, MAX_FORM_DEPTH,
};
use crate::error::{Error, Result};
use crate::model::RedactionRect;

/// What one application removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedactStats {
    /// Glyphs cut out of text operators
    pub glyphs: usize,
    /// Image or form draws removed
    pub xobjects: usize,
    /// Images rewritten with whitened pixels
    pub images_blanked: usize,
    /// Partially covered images left as they were (unsupported encoding)
    pub images_skipped: usize,
    /// Forms rewritten into page-private copies
    pub forms_rewritten: usize,
    /// Partially covered forms left as they were (unreadable or nested too deeply)
    pub forms_skipped: usize,
}

impl RedactStats {
    /// Covered content that could not be removed.
    pub fn retained(&self) -> usize {
        self.images_skipped + self.forms_skipped
    }
}

/// XObjects drawn under a rectangle without being fully inside one:
/// resource name and placement.
type Partial = Vec<(Vec<u8>, Matrix)>;

struct RedactionCollector<'b> {
    boxes: &'b [UserBox],
    replaced: HashMap<usize, Vec<Operation>>,
    removed: HashSet<usize>,
    partial_images: Partial,
    partial_forms: Partial,
    glyphs: usize,
}

impl RedactionCollector<'_> {
    fn covers(&self, target: &UserBox) -> bool {
        self.boxes.iter().any(|b| b.contains(target))
    }

    fn touches(&self, target: &UserBox) -> bool {
        self.boxes.iter().any(|b| b.intersects(target))
    }
}

impl ContentVisitor for RedactionCollector<'_> {
    fn on_text(&mut self, text: &ShowText) {
        let boxes = self.boxes;
        let hit = |g: &Glyph| {
            let (x, y) = g.bbox.center();
            boxes.iter().any(|b| b.contains_point(x, y))
        };
        let removed = text.glyphs().filter(|g| hit(g)).count();
        if removed == 0 {
            return;
        }
        self.glyphs += removed;

        let mut array = Vec::new();
        for element in &text.elements {
            match element {
                TextElement::Adjust(n) => array.push(Object::Real(*n)),
                TextElement::Str { bytes, glyphs } => {
                    let mut kept = Vec::new();
                    for glyph in glyphs {
                        if hit(glyph) {
                            if !kept.is_empty() {
                                array.push(Object::String(std::mem::take(&mut kept), StringFormat::Hexadecimal));
                            }
                            array.push(Object::Real(-removed_advance(text, glyph)));
                        } else {
                            kept.extend_from_slice(&bytes[glyph.bytes.clone()]);
                        }
                    }
                    if !kept.is_empty() {
                        array.push(Object::String(kept, StringFormat::Hexadecimal));
                    }
                }
            }
        }

        let show = Operation::new("TJ", vec![Object::Array(array)]);
        let ops = match text.operator.as_str() {
            "'" => vec![Operation::new("T*", vec![]), show],
            "\"" => vec![
                Operation::new("Tw", vec![Object::Real(text.word_spacing)]),
                Operation::new("Tc", vec![Object::Real(text.char_spacing)]),
                Operation::new("T*", vec![]),
                show,
            ],
            _ => vec![show],
        };
        self.replaced.insert(text.op_index, ops);
    }

    fn on_image(&mut self, op_index: usize, name: &[u8], placement: &Matrix) {
        let bounds = placement.transform_box(0.0, 0.0, 1.0, 1.0);
        if self.covers(&bounds) {
            self.removed.insert(op_index);
        } else if self.touches(&bounds) {
            self.partial_images.push((name.to_vec(), *placement));
        }
    }

    fn on_form(&mut self, op_index: usize, name: &[u8], form: &FormPlacement) {
        if self.covers(&form.bbox) {
            self.removed.insert(op_index);
        } else if self.touches(&form.bbox) {
            self.partial_forms.push((name.to_vec(), form.matrix));
        }
    }
}

/// `TJ` adjustment (glyph units) equal to a glyph's full advance.
fn removed_advance(text: &ShowText, glyph: &Glyph) -> f32 {
    let spacing = text.char_spacing + if glyph.word_space { text.word_spacing } else { 0.0 };
    if text.font_size.abs() > f32::EPSILON {
        glyph.width + spacing * 1000.0 / text.font_size
    } else {
        glyph.width
    }
}

fn white_fill(b: &UserBox) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![Object::Integer(1), Object::Integer(1), Object::Integer(1)]),
        Operation::new(
            "re",
            vec![
                Object::Real(b.x0),
                Object::Real(b.y0),
                Object::Real(b.x1 - b.x0),
                Object::Real(b.y1 - b.y0),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// One content stream with covered glyphs and draws cut out.
struct Rewrite {
    ops: Vec<Operation>,
    glyphs: usize,
    xobjects: usize,
    partial_images: Partial,
    partial_forms: Partial,
}

fn rewrite_content(interpreter: &Interpreter<'_>, ops: Vec<Operation>, ctm: Matrix, boxes: &[UserBox]) -> Rewrite {
    let mut collector = RedactionCollector {
        boxes,
        replaced: HashMap::new(),
        removed: HashSet::new(),
        partial_images: Vec::new(),
        partial_forms: Vec::new(),
        glyphs: 0,
    };
    interpreter.run_at(&ops, ctm, &mut collector);

    let mut rewritten = Vec::with_capacity(ops.len());
    for (index, op) in ops.into_iter().enumerate() {
        if collector.removed.contains(&index) {
            continue;
        }
        match collector.replaced.remove(&index) {
            Some(replacement) => rewritten.extend(replacement),
            None => rewritten.push(op),
        }
    }

    Rewrite {
        ops: rewritten,
        glyphs: collector.glyphs,
        xobjects: collector.removed.len(),
        partial_images: collector.partial_images,
        partial_forms: collector.partial_forms,
    }
}

/// Blank every rectangle on a page in one rewrite.
pub fn redact_page(doc: &mut Document, page_id: ObjectId, rects: &[RedactionRect]) -> Result<RedactStats> {
    if rects.is_empty() {
        return Ok(RedactStats::default());
    }

    let geometry = PageGeometry::of(doc, page_id);
    let boxes: Vec<UserBox> = rects.iter().map(|r| geometry.to_user(&r.bbox)).collect();
    let ops = page_operations(doc, page_id)?;

    let rewrite = {
        let interpreter = Interpreter::new(doc, page_resources(doc, page_id));
        rewrite_content(&interpreter, ops, Matrix::IDENTITY, &boxes)
    };
    let mut stats = RedactStats {
        glyphs: rewrite.glyphs,
        xobjects: rewrite.xobjects,
        ..Default::default()
    };

    let mut rewritten = Vec::with_capacity(rewrite.ops.len() + 2 + boxes.len() * 5);
    rewritten.push(Operation::new("q", vec![]));
    rewritten.extend(rewrite.ops);
    rewritten.push(Operation::new("Q", vec![]));
    for b in &boxes {
        rewritten.extend(white_fill(b));
    }

    let resources = page_resources(doc, page_id).cloned().unwrap_or_default();
    let private = rewrite_xobjects(
        doc,
        resources,
        &rewrite.partial_images,
        &rewrite.partial_forms,
        &boxes,
        0,
        &mut stats,
    )?;
    let content = Content { operations: rewritten }
        .encode()
        .map_err(|e| Error::PdfParse(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| Error::Malformed(e.to_string()))?;
    page.set("Contents", Object::Reference(content_id));
    if let Some(resources) = private {
        page.set("Resources", Object::Dictionary(resources));
    }

    log::debug!(
        "page {:?}: removed {} glyphs, {} xobject draws, blanked {} images, rewrote {} forms",
        page_id,
        stats.glyphs,
        stats.xobjects,
        stats.images_blanked,
        stats.forms_rewritten
    );
    Ok(stats)
}

/// Replace partially covered images and forms with cleaned copies.
///
/// The copies are referenced only from the returned resource dictionary,
/// which the caller installs on the page (or on the enclosing form copy).
/// Returns `None` when nothing needed replacing.
fn rewrite_xobjects(
    doc: &mut Document,
    mut resources: Dictionary,
    images: &[(Vec<u8>, Matrix)],
    forms: &[(Vec<u8>, Matrix)],
    boxes: &[UserBox],
    depth: usize,
    stats: &mut RedactStats,
) -> Result<Option<Dictionary>> {
    if images.is_empty() && forms.is_empty() {
        return Ok(None);
    }
    let mut xobjects = get_resolved(doc, &resources, b"XObject")
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut replacements: Vec<(Vec<u8>, Stream)> = Vec::new();
    for (name, _) in images {
        if replacements.iter().any(|(n, _)| n == name) {
            continue;
        }
        let Some(stream) = get_resolved(doc, &xobjects, name).and_then(|o| o.as_stream().ok()) else {
            continue;
        };

        // Every placement of the same image blanks into one copy
        let mut current = stream.clone();
        let mut supported = true;
        for (_, placement) in images.iter().filter(|(n, _)| n == name) {
            match blank_image(doc, &current, placement, boxes)? {
                Some(next) => current = next,
                None => {
                    supported = false;
                    break;
                }
            }
        }
        if supported {
            replacements.push((name.clone(), current));
            stats.images_blanked += 1;
        } else {
            log::warn!(
                "image /{} uses an unsupported encoding, covered pixels left in place",
                String::from_utf8_lossy(name)
            );
            stats.images_skipped += 1;
        }
    }

    let mut seen: HashSet<&[u8]> = HashSet::new();
    for (name, _) in forms {
        if !seen.insert(name.as_slice()) {
            continue;
        }
        let Some(stream) = get_resolved(doc, &xobjects, name)
            .and_then(|o| o.as_stream().ok())
            .cloned()
        else {
            continue;
        };

        let mut current = Some(stream);
        for (_, matrix) in forms.iter().filter(|(n, _)| n == name) {
            current = match current {
                Some(form) => redact_form(doc, &form, matrix, &resources, boxes, depth + 1, stats)?,
                None => None,
            };
        }
        match current {
            Some(form) => {
                replacements.push((name.clone(), form));
                stats.forms_rewritten += 1;
            }
            None => {
                log::warn!(
                    "form XObject /{} could not be rewritten, covered content left in place",
                    String::from_utf8_lossy(name)
                );
                stats.forms_skipped += 1;
            }
        }
    }

    if replacements.is_empty() {
        return Ok(None);
    }
    for (name, stream) in replacements {
        let id = doc.add_object(stream);
        xobjects.set(name, Object::Reference(id));
    }
    resources.set("XObject", Object::Dictionary(xobjects));
    Ok(Some(resources))
}

/// Cut covered content out of a form drawn at `matrix`.
///
/// `inherited` is the resource dictionary the form was drawn with, used
/// when the form has none of its own. Returns `None` when the form content
/// cannot be read or the nesting is too deep.
fn redact_form(
    doc: &mut Document,
    form: &Stream,
    matrix: &Matrix,
    inherited: &Dictionary,
    boxes: &[UserBox],
    depth: usize,
    stats: &mut RedactStats,
) -> Result<Option<Stream>> {
    if depth > MAX_FORM_DEPTH {
        return Ok(None);
    }
    let Some(ops) = form_operations(form) else {
        return Ok(None);
    };
    let resources = form_resources(doc, form)
        .cloned()
        .unwrap_or_else(|| inherited.clone());

    let rewrite = {
        let interpreter = Interpreter::new(doc, Some(&resources));
        rewrite_content(&interpreter, ops, *matrix, boxes)
    };
    stats.glyphs += rewrite.glyphs;
    stats.xobjects += rewrite.xobjects;

    let nested = rewrite_xobjects(
        doc,
        resources,
        &rewrite.partial_images,
        &rewrite.partial_forms,
        boxes,
        depth,
        stats,
    )?;
    let content = Content { operations: rewrite.ops }
        .encode()
        .map_err(|e| Error::PdfParse(e.to_string()))?;

    let mut dict = form.dict.clone();
    dict.remove(b"Filter");
    dict.remove(b"DecodeParms");
    if let Some(nested) = nested {
        dict.set("Resources", Object::Dictionary(nested));
    }
    Ok(Some(Stream::new(dict, content)))
}
