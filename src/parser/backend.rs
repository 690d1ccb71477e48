//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for the two things the engine needs
//! from a PDF library: a read-only layout snapshot per page, and the
//! destructive per-page blank-out primitive. The resolvers never see lopdf
//! types.

use std::path::Path;

use lopdf::{Document as LopdfDocument, ObjectId};

use super::extract::{extract_layout, PageGeometry};
use super::redact::{redact_page, RedactStats};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::lines::DEFAULT_LINE_TOLERANCE;
use crate::model::{ImageBlock, PageLayout, RedactionRect, Word};
use crate::plan::RedactionSink;
use crate::probe::{LayoutProbe, Needle};

/// Page identifier: (object number, generation number).
pub type PageId = ObjectId;

/// Abstract interface for PDF document access and redaction.
///
/// Pages are addressed by 0-based index in document order.
pub trait PdfBackend {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Page width and height in points.
    fn page_size(&self, index: usize) -> Result<(f32, f32)>;

    /// Words, images and gridlines of a page, top-left coordinates.
    fn page_layout(&self, index: usize) -> Result<PageLayout>;

    fn extract_words(&self, index: usize) -> Result<Vec<Word>> {
        Ok(self.page_layout(index)?.words)
    }

    fn extract_image_blocks(&self, index: usize) -> Result<Vec<ImageBlock>> {
        Ok(self.page_layout(index)?.images)
    }

    /// Boxes of every occurrence of `needle`, including ones split across words.
    fn search_literal(&self, index: usize, needle: &str) -> Result<Vec<Rect>> {
        let page = self.page_layout(index)?;
        let probe = LayoutProbe::new(&page, DEFAULT_LINE_TOLERANCE);
        Ok(probe
            .find_all(Needle::Literal(needle))
            .into_iter()
            .map(|m| m.bbox)
            .collect())
    }

    /// Destructively blank every rectangle on a page in one step.
    fn redact_page(&mut self, index: usize, rects: &[RedactionRect]) -> Result<RedactStats>;

    /// Remove pages from the output.
    fn drop_pages(&mut self, indices: &[usize]) -> Result<()>;

    /// Serialize the document, discarding unreferenced objects.
    fn save(&mut self) -> Result<Vec<u8>>;
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // Try UTF-16BE first (BOM marker)
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|c| {
                if c.len() == 2 {
                    Some(u16::from_be_bytes([c[0], c[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16(&utf16).unwrap_or_default();
    }

    // Try UTF-8
    if let Ok(s) = String::from_utf8(bytes.to_vec()) {
        return s;
    }

    // Fallback: Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

// ---------------------------------------------------------------------------
// LopdfBackend — concrete implementation backed by lopdf
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
    pages: Vec<PageId>,
}

impl LopdfBackend {
    /// Load from a file path.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let doc = LopdfDocument::load(path).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::from(e),
        })?;
        Self::from_document(doc)
    }

    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::from(e),
        })?;
        Self::from_document(doc)
    }

    /// Wrap an already loaded document.
    pub fn from_document(doc: LopdfDocument) -> Result<Self> {
        if doc.is_encrypted() {
            return Err(Error::Encrypted);
        }
        let pages: Vec<PageId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(Error::Malformed("document has no pages".to_string()));
        }
        Ok(Self { doc, pages })
    }

    fn page_id(&self, index: usize) -> Result<PageId> {
        self.pages
            .get(index)
            .copied()
            .ok_or(Error::PageOutOfRange(index as u32 + 1, self.pages.len() as u32))
    }
}

impl PdfBackend for LopdfBackend {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<(f32, f32)> {
        let geometry = PageGeometry::of(&self.doc, self.page_id(index)?);
        Ok((geometry.width, geometry.height))
    }

    fn page_layout(&self, index: usize) -> Result<PageLayout> {
        extract_layout(&self.doc, index, self.page_id(index)?)
    }

    fn redact_page(&mut self, index: usize, rects: &[RedactionRect]) -> Result<RedactStats> {
        let page_id = self.page_id(index)?;
        redact_page(&mut self.doc, page_id, rects)
    }

    fn drop_pages(&mut self, indices: &[usize]) -> Result<()> {
        if indices.is_empty() {
            return Ok(());
        }
        for &index in indices {
            self.page_id(index)?;
        }
        let numbers: Vec<u32> = indices.iter().map(|i| *i as u32 + 1).collect();
        self.doc.delete_pages(&numbers);
        self.pages = self.doc.get_pages().into_values().collect();
        log::info!("dropped {} pages", numbers.len());
        Ok(())
    }

    fn save(&mut self) -> Result<Vec<u8>> {
        let pruned = self.doc.prune_objects();
        log::debug!("pruned {} unreferenced objects", pruned.len());
        self.doc.compress();

        let mut out = Vec::new();
        self.doc.save_to(&mut out)?;
        Ok(out)
    }
}

/// [`RedactionSink`] for one page of a backend.
pub struct PageSink<'a, B: PdfBackend + ?Sized> {
    backend: &'a mut B,
    index: usize,
    pending: Vec<RedactionRect>,
    stats: RedactStats,
}

impl<'a, B: PdfBackend + ?Sized> PageSink<'a, B> {
    pub fn new(backend: &'a mut B, index: usize) -> Self {
        Self {
            backend,
            index,
            pending: Vec::new(),
            stats: RedactStats::default(),
        }
    }

    /// What the last apply removed.
    pub fn stats(&self) -> RedactStats {
        self.stats
    }
}

impl<B: PdfBackend + ?Sized> RedactionSink for PageSink<'_, B> {
    fn mark(&mut self, rect: &RedactionRect) {
        self.pending.push(*rect);
    }

    fn apply(&mut self) -> Result<()> {
        let rects = std::mem::take(&mut self.pending);
        self.stats = self.backend.redact_page(self.index, &rects)?;
        Ok(())
    }
}
