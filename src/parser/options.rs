//! Redaction options and configuration.

use crate::ocr::OcrOptions;

/// Pages processed per document. Later pages follow [`OverflowPolicy`].
pub const MAX_PROCESSED_PAGES: usize = 23;

/// Options for redacting a document.
#[derive(Debug, Clone)]
pub struct RedactOptions {
    /// Error handling mode for per-page extraction failures
    pub error_mode: ErrorMode,

    /// Number of pages run through the pipeline
    pub max_pages: usize,

    /// What happens to pages beyond `max_pages`
    pub overflow: OverflowPolicy,

    /// Whether to plan pages in parallel
    pub parallel: bool,

    /// OCR fallback for scanned pages
    pub ocr: OcrOptions,
}

impl RedactOptions {
    /// Create new redact options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode: a page whose content cannot be read is
    /// still blanked by its fixed regions instead of failing the document.
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Set the page cap.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the overflow policy.
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set OCR options.
    pub fn with_ocr(mut self, ocr: OcrOptions) -> Self {
        self.ocr = ocr;
        self
    }

    /// Disable the OCR fallback.
    pub fn without_ocr(mut self) -> Self {
        self.ocr.enabled = false;
        self
    }
}

impl Default for RedactOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Strict,
            max_pages: MAX_PROCESSED_PAGES,
            overflow: OverflowPolicy::PassThrough,
            parallel: true,
            ocr: OcrOptions::default(),
        }
    }
}

/// Error handling mode during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail on any error
    #[default]
    Strict,
    /// Skip unreadable content and continue
    Lenient,
}

/// Treatment of pages beyond the page cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Copy them to the output unmodified
    #[default]
    PassThrough,
    /// Remove them from the output
    Drop,
}
