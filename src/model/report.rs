//! Per-document outcome of a redaction run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{TargetField, TextSource};

/// A recoverable finding. Never blocks output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An expected label is absent; the field fell back to fixed coordinates.
    AnchorNotFound { field: TargetField, label: String },
    /// More than one occurrence of a label; the topmost-leftmost one was used.
    AmbiguousMatch { label: String, count: usize },
    /// Shaping produced a non-positive rectangle; a minimum-size box was substituted.
    GeometryDegenerate { field: TargetField },
    /// Neither an anchor nor a fallback produced a rectangle.
    FieldSkipped { field: TargetField },
    /// The OCR engine could not be started; scanned pages may retain PII.
    OcrEngineUnavailable { message: String },
    /// OCR or rasterization exceeded its time budget.
    OcrTimeout { seconds: u64 },
    /// OCR or rasterization failed for this page.
    OcrFailed { message: String },
    /// Partly covered images or forms could not be rewritten; covered
    /// content may still be extractable from them.
    ContentRetained { images: usize, forms: usize },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::AnchorNotFound { field, label } => {
                write!(f, "{}: anchor '{}' not found, using fallback", field, label)
            }
            Warning::AmbiguousMatch { label, count } => {
                write!(f, "anchor '{}' matched {} times, using topmost", label, count)
            }
            Warning::GeometryDegenerate { field } => {
                write!(f, "{}: degenerate rectangle replaced by minimum box", field)
            }
            Warning::FieldSkipped { field } => write!(f, "{}: nothing to redact", field),
            Warning::OcrEngineUnavailable { message } => {
                write!(f, "OCR unavailable ({}); scanned pages may retain PII", message)
            }
            Warning::OcrTimeout { seconds } => write!(f, "OCR timed out after {}s", seconds),
            Warning::OcrFailed { message } => write!(f, "OCR failed: {}", message),
            Warning::ContentRetained { images, forms } => write!(
                f,
                "{} images and {} forms under a rectangle could not be rewritten; covered content may remain",
                images, forms
            ),
        }
    }
}

/// What happened to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageDisposition {
    /// Planned and committed
    Redacted,
    /// Beyond the page cap, copied unmodified
    PassedThrough,
    /// Beyond the page cap, removed from the output
    Dropped,
}

/// Outcome for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// Page index (0-based)
    pub index: usize,
    pub disposition: PageDisposition,
    /// Origin of the words the resolvers saw
    pub source: TextSource,
    /// Rectangles committed per field
    pub fields: BTreeMap<TargetField, usize>,
    pub warnings: Vec<Warning>,
}

impl PageReport {
    pub fn new(index: usize, disposition: PageDisposition) -> Self {
        Self {
            index,
            disposition,
            source: TextSource::Digital,
            fields: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Total rectangles committed on this page.
    pub fn rect_count(&self) -> usize {
        self.fields.values().sum()
    }
}

/// Outcome for a whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionReport {
    /// Template profile used
    pub profile: String,
    /// Pages in the input document
    pub page_count: usize,
    pub pages: Vec<PageReport>,
    /// True when the OCR fallback was needed but could not run
    pub ocr_skipped: bool,
}

impl RedactionReport {
    /// Total rectangles committed across the document.
    pub fn rect_count(&self) -> usize {
        self.pages.iter().map(PageReport::rect_count).sum()
    }

    /// All warnings with their page index.
    pub fn warnings(&self) -> impl Iterator<Item = (usize, &Warning)> {
        self.pages
            .iter()
            .flat_map(|p| p.warnings.iter().map(move |w| (p.index, w)))
    }

    /// Pages that went through the pipeline.
    pub fn redacted_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.disposition == PageDisposition::Redacted)
            .count()
    }
}
