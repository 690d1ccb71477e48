//! Error types for redactpdf library.

use std::io;
use thiserror::Error;

/// Result type alias for redactpdf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while redacting a document.
///
/// Only document-level failures are represented here. Per-field problems
/// (a missing anchor label, an ambiguous match, a degenerate rectangle) are
/// recovered locally and reported as [`crate::model::Warning`] values.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// The document parsed but its page tree or content is unusable.
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// The OCR engine cannot be started.
    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    /// The OCR engine ran but failed.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Page rasterization failed.
    #[error("Rasterization error: {0}")]
    Raster(String),

    /// An external process exceeded its time budget.
    #[error("{0} timed out after {1} seconds")]
    Timeout(String, u64),

    /// Image decoding or re-encoding failed.
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid template profile.
    #[error("Invalid template profile: {0}")]
    Profile(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Access is temporarily locked after repeated failures.
    #[error("Access locked until {0}")]
    Locked(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "Page 10 is out of range (document has 5 pages)"
        );

        let err = Error::Timeout("tesseract".to_string(), 60);
        assert_eq!(err.to_string(), "tesseract timed out after 60 seconds");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
