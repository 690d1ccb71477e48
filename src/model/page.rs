//! Page-level layout types.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Where a page's words came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Text extracted from the content stream
    Digital,
    /// Text recognized from a rasterized page image
    Ocr,
}

/// An atomic extracted text unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Text content (NFC-normalized)
    pub text: String,
    /// Bounding box in page points
    pub bbox: Rect,
    /// OCR confidence (engine scale, typically 0-100); `None` for digital text
    pub confidence: Option<f32>,
}

impl Word {
    /// Create a word from digitally extracted text.
    pub fn new(text: impl Into<String>, bbox: Rect) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: None,
        }
    }

    /// Create an OCR-derived word.
    pub fn recognized(text: impl Into<String>, bbox: Rect, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: Some(confidence),
        }
    }

    /// Number of Unicode scalar values in the text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Approximate box of the characters `[start, end)` of this word.
    ///
    /// Glyph advances are not retained per word, so the box is split
    /// proportionally to the character count.
    pub fn sub_rect(&self, start: usize, end: usize) -> Rect {
        let total = self.char_count().max(1) as f32;
        let w = self.bbox.width();
        let start = start.min(end) as f32;
        let end = end as f32;
        Rect::new(
            self.bbox.x0 + w * (start / total),
            self.bbox.y0,
            self.bbox.x0 + w * (end.min(total) / total),
            self.bbox.y1,
        )
    }
}

/// A raster image placed on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    /// Placement box in page points
    pub bbox: Rect,
    /// XObject resource name, when drawn through `Do`
    pub name: Option<String>,
}

impl ImageBlock {
    pub fn new(bbox: Rect) -> Self {
        Self { bbox, name: None }
    }
}

/// A thin horizontal rule (table gridline) found in the vector content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Vertical position of the rule's center line
    pub y: f32,
    /// Left end
    pub x0: f32,
    /// Right end
    pub x1: f32,
}

impl Rule {
    pub fn new(y: f32, x0: f32, x1: f32) -> Self {
        Self {
            y,
            x0: x0.min(x1),
            x1: x0.max(x1),
        }
    }

    /// True when the rule spans horizontally over any part of `[x0, x1]`.
    pub fn spans(&self, x0: f32, x1: f32) -> bool {
        self.x1 > x0 && self.x0 < x1
    }
}

/// What the core knows about one page.
///
/// Built fresh per page by the extraction or OCR collaborator and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    /// Page index (0-based)
    pub index: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Words in content-stream (or OCR) order
    pub words: Vec<Word>,
    /// Embedded raster images
    pub images: Vec<ImageBlock>,
    /// Horizontal gridlines
    pub rules: Vec<Rule>,
    /// Origin of `words`
    pub source: TextSource,
}

impl PageLayout {
    /// Create an empty page of the given size.
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            words: Vec::new(),
            images: Vec::new(),
            rules: Vec::new(),
            source: TextSource::Digital,
        }
    }

    /// Create an empty A4 page (595 x 842 pt).
    pub fn a4(index: usize) -> Self {
        Self::new(index, 595.0, 842.0)
    }

    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.words = words;
        self
    }

    pub fn with_images(mut self, images: Vec<ImageBlock>) -> Self {
        self.images = images;
        self
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_source(mut self, source: TextSource) -> Self {
        self.source = source;
        self
    }

    /// Whether this is the first page of the document.
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// The whole page as a rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Plain text, one word per token, in stored order.
    pub fn plain_text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
