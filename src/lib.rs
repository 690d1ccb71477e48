//! # redactpdf
//!
//! Layout-aware PII redaction for fixed-template Korean school transcript
//! PDFs (학교생활기록부).
//!
//! Each page is read into a layout snapshot (words, images, table rules),
//! every sensitive field is located by a chain of strategies (anchor label,
//! column header, section band, regex, fixed region), the rectangles are
//! shrunk so they never cover table borders, and the page is rewritten so
//! the covered text and images are removed from the file, not just painted
//! over.
//!
//! ## Quick Start
//!
//! ```no_run
//! use redactpdf::Redactor;
//!
//! fn main() -> redactpdf::Result<()> {
//!     let result = Redactor::new().redact_file("transcript.pdf")?;
//!     result.save("masked_transcript.pdf")?;
//!
//!     for (page, warning) in result.report.warnings() {
//!         eprintln!("page {}: {}", page + 1, warning);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **True redaction**: glyphs and image pixels under a rectangle are deleted
//! - **Border-safe**: rectangles stay inside the table gridlines
//! - **Footer identity masking**: class and number survive, the name does not
//! - **OCR fallback**: scanned pages go through `pdftoppm` + `tesseract`
//! - **Parallel processing**: pages are planned with Rayon
//! - **JSON report**: per-page field counts and warnings

pub mod access;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod lines;
pub mod model;
pub mod ocr;
pub mod parser;
pub mod plan;
pub mod probe;
pub mod profile;
pub mod redactor;
pub mod resolve;
pub mod shaping;

// Re-export commonly used types
pub use access::{AccessGate, AttemptLimiter, FileAttemptLimiter, LockoutState, MemoryAttemptLimiter};
pub use detect::{detect_format_from_bytes, detect_format_from_path, PdfFormat};
pub use error::{Error, Result};
pub use geometry::{FracRect, Rect};
pub use model::{
    Color, ImageBlock, PageDisposition, PageLayout, PageReport, RedactionRect, RedactionReport, Rule,
    TargetField, TextSource, Warning, Word,
};
pub use ocr::{OcrEngine, OcrFallback, OcrOptions, Rasterizer};
pub use parser::{ErrorMode, LopdfBackend, OverflowPolicy, PdfBackend, RedactOptions, MAX_PROCESSED_PAGES};
pub use plan::{RedactionPlan, RedactionSink};
pub use probe::LayoutProbe;
pub use profile::TemplateProfile;
pub use redactor::{PageInspection, RedactionResult, Redactor};

use std::path::Path;

/// Redact a PDF file with the default profile and options.
///
/// # Example
///
/// ```no_run
/// use redactpdf::redact_file;
///
/// let result = redact_file("transcript.pdf").unwrap();
/// result.save("masked_transcript.pdf").unwrap();
/// ```
pub fn redact_file<P: AsRef<Path>>(path: P) -> Result<RedactionResult> {
    Redactor::new().redact_file(path)
}

/// Redact a PDF held in memory with the default profile and options.
///
/// # Example
///
/// ```no_run
/// use redactpdf::redact_bytes;
///
/// let data = std::fs::read("transcript.pdf").unwrap();
/// let result = redact_bytes(&data).unwrap();
/// println!("{}", serde_json::to_string_pretty(&result.report).unwrap());
/// ```
pub fn redact_bytes(data: &[u8]) -> Result<RedactionResult> {
    Redactor::new().redact_bytes(data)
}

/// Redact a file with a profile loaded from JSON.
pub fn redact_file_with_profile<P: AsRef<Path>, Q: AsRef<Path>>(path: P, profile: Q) -> Result<RedactionResult> {
    let profile = TemplateProfile::from_path(profile)?;
    Redactor::new().with_profile(profile).redact_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_bytes_empty_data() {
        let data: [u8; 0] = [];
        assert!(matches!(redact_bytes(&data), Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_redact_bytes_unknown_magic() {
        let data = b"<!DOCTYPE html><html></html>";
        assert!(matches!(redact_bytes(data), Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_redact_file_missing() {
        let result = redact_file("definitely/not/here.pdf");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_invalid_profile_is_rejected_before_loading() {
        let mut profile = TemplateProfile::default();
        profile.footer_top_frac = 1.5;
        let result = Redactor::new()
            .with_profile(profile)
            .without_ocr()
            .redact_bytes(b"%PDF-1.7\n");
        assert!(matches!(result, Err(Error::Profile(_))));
    }

    #[test]
    fn test_page_cap_default() {
        assert_eq!(RedactOptions::default().max_pages, MAX_PROCESSED_PAGES);
        assert_eq!(MAX_PROCESSED_PAGES, 23);
    }
}
