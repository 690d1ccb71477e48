//! PDF header sniffing.
//!
//! Uploads are checked here before lopdf sees them, so that an obviously
//! wrong file (an HWP export, an HTML error page saved as `.pdf`) is
//! rejected as [`Error::UnknownFormat`] instead of surfacing as a parser error.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Readers tolerate leading garbage before the header within this window.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// The `%%EOF` marker is expected within this many trailing bytes.
const TRAILER_SEARCH_WINDOW: usize = 1024;

/// Header facts about an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` header (non-zero for files with a preamble)
    pub header_offset: usize,
    /// Whether a `%%EOF` marker was found near the end of the data
    pub has_eof_marker: bool,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// Detect the PDF format of a file on disk.
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    detect_format_from_bytes(&data)
}

/// Detect the PDF format of an in-memory document.
///
/// Returns [`Error::UnknownFormat`] when no `%PDF-` header appears in the
/// first kilobyte, and [`Error::UnsupportedVersion`] for a malformed version.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let header_offset = find(window, PDF_MAGIC).ok_or(Error::UnknownFormat)?;

    let version_start = header_offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(version_start..version_start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    let tail_start = data.len().saturating_sub(TRAILER_SEARCH_WINDOW);
    let has_eof_marker = find(&data[tail_start..], b"%%EOF").is_some();

    Ok(PdfFormat {
        version,
        header_offset,
        has_eof_marker,
    })
}

/// Check if bytes start like a PDF document.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}
