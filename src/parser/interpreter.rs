//! Content-stream interpreter.
//!
//! Walks a page's operations, tracking the graphics and text state, and
//! reports positioned glyphs, image placements and thin horizontal rules to
//! a [`ContentVisitor`]. Extraction and redaction share this walk, so a
//! glyph is located the same way when it is read and when it is removed.
//! Form XObjects are reported as placements; a visitor that asks for it also
//! receives the events of the form's own content, positioned on the page.
//!
//! Coordinates reported here are PDF user space (origin bottom-left).

use std::collections::HashMap;
use std::ops::Range;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

use super::fonts::{get_resolved, load_fonts, number, resolve, FontInfo};

/// Rules must be at least this long, in points.
const MIN_RULE_LENGTH: f32 = 3.0;
/// A stroked segment counts as horizontal within this slope, in points.
const HORIZONTAL_SLACK: f32 = 0.5;
/// Filled rectangles thinner than this are drawn rules.
const MAX_RULE_THICKNESS: f32 = 1.5;
/// Forms nested deeper than this are not entered.
pub const MAX_FORM_DEPTH: usize = 8;

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let v: Vec<f32> = operands.iter().take(6).filter_map(number).collect();
        (v.len() == 6).then(|| Self::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        Some(Matrix {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    /// Bounding box of the transformed rectangle `[x0, x1] × [y0, y1]`.
    pub fn transform_box(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> UserBox {
        let corners = [
            self.apply(x0, y0),
            self.apply(x1, y0),
            self.apply(x0, y1),
            self.apply(x1, y1),
        ];
        let mut b = UserBox::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1);
        for (x, y) in &corners[1..] {
            b.x0 = b.x0.min(*x);
            b.y0 = b.y0.min(*y);
            b.x1 = b.x1.max(*x);
            b.y1 = b.y1.max(*y);
        }
        b
    }
}

/// Box in PDF user space: `y0` is the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl UserBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    pub fn contains(&self, other: &UserBox) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1
    }

    pub fn intersects(&self, other: &UserBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

/// Where a form XObject lands on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormPlacement {
    /// Form space to user space: the form's `/Matrix` followed by the CTM
    pub matrix: Matrix,
    /// The form's `/BBox` in user space; unbounded when the form has none
    pub bbox: UserBox,
}

/// One positioned glyph.
#[derive(Debug, Clone)]
pub struct Glyph {
    /// Decoded text
    pub text: String,
    /// Byte range of the code within its string operand
    pub bytes: Range<usize>,
    /// Advance width, glyph units
    pub width: f32,
    /// Word spacing applied after this glyph
    pub word_space: bool,
    /// Glyph box, user space
    pub bbox: UserBox,
}

/// A string operand or a `TJ` position adjustment.
#[derive(Debug, Clone)]
pub enum TextElement {
    Str { bytes: Vec<u8>, glyphs: Vec<Glyph> },
    Adjust(f32),
}

/// One text-showing operation (`Tj`, `TJ`, `'` or `"`).
#[derive(Debug, Clone)]
pub struct ShowText {
    pub op_index: usize,
    pub operator: String,
    pub elements: Vec<TextElement>,
    pub font_size: f32,
    pub char_spacing: f32,
    pub word_spacing: f32,
    /// Horizontal scaling as a fraction
    pub h_scale: f32,
}

impl ShowText {
    pub fn glyphs(&self) -> impl Iterator<Item = &Glyph> {
        self.elements.iter().flat_map(|e| match e {
            TextElement::Str { glyphs, .. } => glyphs.as_slice(),
            TextElement::Adjust(_) => &[],
        })
    }
}

/// Receives interpreter events. All methods default to no-ops.
pub trait ContentVisitor {
    fn on_text(&mut self, _text: &ShowText) {}

    /// An image XObject drawn by `Do`; `placement` maps the unit square to user space.
    fn on_image(&mut self, _op_index: usize, _name: &[u8], _placement: &Matrix) {}

    /// A form XObject drawn by `Do`.
    fn on_form(&mut self, _op_index: usize, _name: &[u8], _form: &FormPlacement) {}

    /// Walk form content in place after [`ContentVisitor::on_form`].
    ///
    /// Events from inside a form carry operation indices of the form's own
    /// content, so visitors that rewrite by index leave this off.
    fn enters_forms(&self) -> bool {
        false
    }

    /// A thin horizontal rule at user-space height `y`.
    fn on_rule(&mut self, _y: f32, _x0: f32, _x1: f32) {}
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
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
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Line(f32, f32, f32, f32),
    Rect(UserBox),
}

/// Interpreter bound to one set of resources.
pub struct Interpreter<'a> {
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    fonts: HashMap<Vec<u8>, FontInfo<'a>>,
    fallback_font: FontInfo<'a>,
    xobjects: Option<&'a Dictionary>,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a Document, resources: Option<&'a Dictionary>) -> Self {
        let xobjects = resources
            .and_then(|r| get_resolved(doc, r, b"XObject"))
            .and_then(|o| o.as_dict().ok());
        Self {
            doc,
            resources,
            fonts: load_fonts(doc, resources),
            fallback_font: FontInfo::fallback(),
            xobjects,
            depth: 0,
        }
    }

    /// Interpreter for the content of `form`, drawn from inside this one.
    ///
    /// A form without its own `/Resources` uses the resources it was drawn
    /// with.
    pub fn for_form(&self, form: &'a Stream) -> Self {
        let resources = form_resources(self.doc, form).or(self.resources);
        Self {
            depth: self.depth + 1,
            ..Self::new(self.doc, resources)
        }
    }

    pub fn run<V: ContentVisitor + ?Sized>(&self, ops: &[Operation], visitor: &mut V) {
        self.run_at(ops, Matrix::IDENTITY, visitor);
    }

    /// Walk `ops` starting from the transform `ctm`, as form content drawn
    /// at that placement is walked.
    pub fn run_at<V: ContentVisitor + ?Sized>(&self, ops: &[Operation], ctm: Matrix, visitor: &mut V) {
        let mut gs = GraphicsState {
            ctm,
            ..GraphicsState::default()
        };
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;
        let mut path: Vec<Segment> = Vec::new();
        let mut current: Option<(f32, f32)> = None;
        let mut start: Option<(f32, f32)> = None;

        for (index, op) in ops.iter().enumerate() {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(number);

            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        gs.ctm = m.multiply(&gs.ctm);
                    }
                }

                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    gs.font = operands.first().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec);
                    gs.font_size = num(1).unwrap_or(gs.font_size);
                }
                "Tc" => gs.char_spacing = num(0).unwrap_or(0.0),
                "Tw" => gs.word_spacing = num(0).unwrap_or(0.0),
                "Tz" => gs.h_scale = num(0).unwrap_or(100.0) / 100.0,
                "TL" => gs.leading = num(0).unwrap_or(0.0),
                "Ts" => gs.rise = num(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let (tx, ty) = (num(0).unwrap_or(0.0), num(1).unwrap_or(0.0));
                    if op.operator == "TD" {
                        gs.leading = -ty;
                    }
                    tlm = Matrix::translate(tx, ty).multiply(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.leading).multiply(&tlm);
                    tm = tlm;
                }
                "Tj" | "TJ" | "'" | "\"" => {
                    let shown: &[Object] = match op.operator.as_str() {
                        "'" => {
                            tlm = Matrix::translate(0.0, -gs.leading).multiply(&tlm);
                            tm = tlm;
                            operands.get(..1).unwrap_or(&[])
                        }
                        "\"" => {
                            gs.word_spacing = num(0).unwrap_or(gs.word_spacing);
                            gs.char_spacing = num(1).unwrap_or(gs.char_spacing);
                            tlm = Matrix::translate(0.0, -gs.leading).multiply(&tlm);
                            tm = tlm;
                            operands.get(2..3).unwrap_or(&[])
                        }
                        "TJ" => match operands.first() {
                            Some(Object::Array(items)) => items.as_slice(),
                            _ => &[],
                        },
                        _ => operands.get(..1).unwrap_or(&[]),
                    };
                    let text = self.show(index, &op.operator, shown, &gs, &mut tm);
                    visitor.on_text(&text);
                }

                "m" => {
                    if let (Some(x), Some(y)) = (num(0), num(1)) {
                        let p = gs.ctm.apply(x, y);
                        current = Some(p);
                        start = Some(p);
                    }
                }
                "l" => {
                    if let (Some(x), Some(y), Some(from)) = (num(0), num(1), current) {
                        let to = gs.ctm.apply(x, y);
                        path.push(Segment::Line(from.0, from.1, to.0, to.1));
                        current = Some(to);
                    }
                }
                "h" => {
                    if let (Some(from), Some(to)) = (current, start) {
                        path.push(Segment::Line(from.0, from.1, to.0, to.1));
                        current = start;
                    }
                }
                "re" => {
                    if let (Some(x), Some(y), Some(w), Some(h)) = (num(0), num(1), num(2), num(3)) {
                        path.push(Segment::Rect(gs.ctm.transform_box(x, y, x + w, y + h)));
                        let p = gs.ctm.apply(x, y);
                        current = Some(p);
                        start = Some(p);
                    }
                }
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" => {
                    let stroke = matches!(op.operator.as_str(), "S" | "s" | "B" | "B*" | "b" | "b*");
                    let fill = matches!(op.operator.as_str(), "f" | "F" | "f*" | "B" | "B*" | "b" | "b*");
                    emit_rules(&path, stroke, fill, visitor);
                    path.clear();
                    current = None;
                    start = None;
                }

                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_xobject(index, name, &gs.ctm, visitor);
                    }
                }
                _ => {}
            }
        }
    }

    fn font(&self, name: Option<&Vec<u8>>) -> &FontInfo<'a> {
        name.and_then(|n| self.fonts.get(n)).unwrap_or(&self.fallback_font)
    }

    fn show(
        &self,
        op_index: usize,
        operator: &str,
        shown: &[Object],
        gs: &GraphicsState,
        tm: &mut Matrix,
    ) -> ShowText {
        let font = self.font(gs.font.as_ref());
        let fs = gs.font_size;
        let th = gs.h_scale;
        let size_matrix = Matrix::new(fs * th, 0.0, 0.0, fs, 0.0, gs.rise);

        let mut elements = Vec::with_capacity(shown.len());
        for item in shown {
            match item {
                Object::String(bytes, _) => {
                    let mut glyphs = Vec::new();
                    for (code, range) in font.codes(bytes) {
                        let w0 = font.width(code);
                        let word_space = font.is_word_space(code);
                        let trm = size_matrix.multiply(tm).multiply(&gs.ctm);
                        let bbox = trm.transform_box(0.0, font.descent, w0 / 1000.0, font.ascent);

                        glyphs.push(Glyph {
                            text: font.decode(self.doc, code, &bytes[range.clone()]),
                            bytes: range,
                            width: w0,
                            word_space,
                            bbox,
                        });

                        let spacing = gs.char_spacing + if word_space { gs.word_spacing } else { 0.0 };
                        let tx = (w0 / 1000.0 * fs + spacing) * th;
                        *tm = Matrix::translate(tx, 0.0).multiply(tm);
                    }
                    elements.push(TextElement::Str {
                        bytes: bytes.clone(),
                        glyphs,
                    });
                }
                other => {
                    if let Some(n) = number(other) {
                        let tx = -n / 1000.0 * fs * th;
                        *tm = Matrix::translate(tx, 0.0).multiply(tm);
                        elements.push(TextElement::Adjust(n));
                    }
                }
            }
        }

        ShowText {
            op_index,
            operator: operator.to_string(),
            elements,
            font_size: fs,
            char_spacing: gs.char_spacing,
            word_spacing: gs.word_spacing,
            h_scale: th,
        }
    }

    fn draw_xobject<V: ContentVisitor + ?Sized>(&self, index: usize, name: &[u8], ctm: &Matrix, visitor: &mut V) {
        let Some(stream) = self
            .xobjects
            .and_then(|x| get_resolved(self.doc, x, name))
            .and_then(|o| o.as_stream().ok())
        else {
            return;
        };

        let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        match subtype {
            Some(b"Image") => visitor.on_image(index, name, ctm),
            Some(b"Form") => {
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .map(|o| resolve(self.doc, o))
                    .and_then(|o| o.as_array().ok())
                    .and_then(|a| Matrix::from_operands(a))
                    .unwrap_or(Matrix::IDENTITY);
                let matrix = form_matrix.multiply(ctm);
                let bbox = stream
                    .dict
                    .get(b"BBox")
                    .ok()
                    .map(|o| resolve(self.doc, o))
                    .and_then(|o| o.as_array().ok())
                    .map(|a| a.iter().filter_map(number).collect::<Vec<_>>())
                    .filter(|v| v.len() == 4)
                    .map(|v| matrix.transform_box(v[0], v[1], v[2], v[3]))
                    .unwrap_or(UserBox::new(-f32::MAX, -f32::MAX, f32::MAX, f32::MAX));

                visitor.on_form(index, name, &FormPlacement { matrix, bbox });
                if visitor.enters_forms() {
                    self.enter_form(name, stream, matrix, visitor);
                }
            }
            _ => {}
        }
    }

    fn enter_form<V: ContentVisitor + ?Sized>(
        &self,
        name: &[u8],
        stream: &'a Stream,
        matrix: Matrix,
        visitor: &mut V,
    ) {
        if self.depth >= MAX_FORM_DEPTH {
            log::warn!(
                "form XObject /{} nested too deeply, not entered",
                String::from_utf8_lossy(name)
            );
            return;
        }
        match form_operations(stream) {
            Some(ops) => self.for_form(stream).run_at(&ops, matrix, visitor),
            None => log::warn!("form XObject /{} has unreadable content", String::from_utf8_lossy(name)),
        }
    }
}

/// The form's own resource dictionary, if it has one.
pub fn form_resources<'a>(doc: &'a Document, form: &'a Stream) -> Option<&'a Dictionary> {
    form.dict
        .get(b"Resources")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
}

/// Decoded operations of a form XObject.
pub fn form_operations(form: &Stream) -> Option<Vec<Operation>> {
    let data = form.decompressed_content().unwrap_or_else(|_| form.content.clone());
    Content::decode(&data).ok().map(|c| c.operations)
}

fn emit_rules<V: ContentVisitor + ?Sized>(path: &[Segment], stroke: bool, fill: bool, visitor: &mut V) {
    for segment in path {
        match *segment {
            Segment::Line(x0, y0, x1, y1) if stroke => {
                if (y1 - y0).abs() <= HORIZONTAL_SLACK && (x1 - x0).abs() >= MIN_RULE_LENGTH {
                    visitor.on_rule((y0 + y1) / 2.0, x0.min(x1), x0.max(x1));
                }
            }
            Segment::Rect(b) => {
                let (w, h) = (b.x1 - b.x0, b.y1 - b.y0);
                if w < MIN_RULE_LENGTH {
                    continue;
                }
                if fill && h <= MAX_RULE_THICKNESS {
                    visitor.on_rule((b.y0 + b.y1) / 2.0, b.x0, b.x1);
                } else if stroke {
                    visitor.on_rule(b.y0, b.x0, b.x1);
                    visitor.on_rule(b.y1, b.x0, b.x1);
                }
            }
            _ => {}
        }
    }
}
