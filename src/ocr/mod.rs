//! OCR fallback for scanned pages.
//!
//! A page whose digital text is too sparse is rasterized and recognized;
//! the recognized words replace the extracted ones before field
//! resolution. Both collaborators are traits so the pipeline can run with
//! the `pdftoppm` and `tesseract` command-line tools or with test doubles.

mod pdftoppm;
mod process;
mod tesseract;

use std::path::Path;
use std::time::Duration;

use image::DynamicImage;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::geometry::Rect;
use crate::model::Word;

pub use pdftoppm::PdftoppmRasterizer;
pub use process::run_bounded;
pub use tesseract::{parse_tsv, TesseractEngine};

/// OCR settings.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    /// Run the fallback at all
    pub enabled: bool,
    /// Rasterization resolution
    pub dpi: u32,
    /// Recognition language(s), tesseract syntax
    pub lang: String,
    /// Words below this confidence are discarded
    pub min_confidence: f32,
    /// Budget per external invocation
    pub timeout: Duration,
}

impl OcrOptions {
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            dpi: 300,
            lang: "kor".to_string(),
            min_confidence: 35.0,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Pixel box as reported by the engine: left, top, width, height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// One recognized word.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
    pub bbox: PixelBox,
    /// Engine line identifier (block, paragraph, line)
    pub line: (u32, u32, u32),
}

/// Renders one page of a document to an image.
pub trait Rasterizer: Send + Sync {
    fn render(&self, document: &Path, page_index: usize, dpi: u32) -> Result<DynamicImage>;
}

/// Recognizes words in a page image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<Vec<OcrWord>>;
}

/// Convert recognized words to page words.
///
/// Pixel boxes are scaled by `page_width / image_width` horizontally and
/// `page_height / image_height` vertically. Words below `min_confidence`
/// or with blank text are dropped; text is NFC-normalized.
pub fn to_page_words(
    words: &[OcrWord],
    image_size: (u32, u32),
    page_size: (f32, f32),
    min_confidence: f32,
) -> Vec<Word> {
    let (iw, ih) = image_size;
    if iw == 0 || ih == 0 {
        return Vec::new();
    }
    let sx = page_size.0 / iw as f32;
    let sy = page_size.1 / ih as f32;

    words
        .iter()
        .filter(|w| w.confidence >= min_confidence)
        .filter_map(|w| {
            let text: String = w.text.trim().nfc().collect();
            if text.is_empty() {
                return None;
            }
            let b = w.bbox;
            let rect = Rect::new(
                b.left as f32 * sx,
                b.top as f32 * sy,
                (b.left + b.width) as f32 * sx,
                (b.top + b.height) as f32 * sy,
            );
            Some(Word::recognized(text, rect, w.confidence))
        })
        .collect()
}

/// Rasterizer and engine bound together with their settings.
pub struct OcrFallback {
    rasterizer: Box<dyn Rasterizer>,
    engine: Box<dyn OcrEngine>,
    options: OcrOptions,
}

impl OcrFallback {
    pub fn new(rasterizer: Box<dyn Rasterizer>, engine: Box<dyn OcrEngine>, options: OcrOptions) -> Self {
        Self {
            rasterizer,
            engine,
            options,
        }
    }

    /// `pdftoppm` + `tesseract` with the given options.
    pub fn command_line(options: OcrOptions) -> Self {
        Self::new(
            Box::new(PdftoppmRasterizer::new(options.timeout)),
            Box::new(TesseractEngine::new(options.timeout)),
            options,
        )
    }

    pub fn options(&self) -> &OcrOptions {
        &self.options
    }

    /// Recognize one page, returning words in page points.
    pub fn recognize_page(
        &self,
        document: &Path,
        page_index: usize,
        page_size: (f32, f32),
    ) -> Result<Vec<Word>> {
        let image = self.rasterizer.render(document, page_index, self.options.dpi)?;
        let recognized = self.engine.recognize(&image, &self.options.lang)?;
        let words = to_page_words(
            &recognized,
            (image.width(), image.height()),
            page_size,
            self.options.min_confidence,
        );
        log::info!(
            "page {}: OCR recognized {} words ({} accepted)",
            page_index + 1,
            recognized.len(),
            words.len()
        );
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ocr_word(text: &str, confidence: f32, left: u32, top: u32) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            confidence,
            bbox: PixelBox {
                left,
                top,
                width: 250,
                height: 50,
            },
            line: (1, 1, 1),
        }
    }

    #[test]
    fn test_pixel_to_point_scaling() {
        // A4 at 300 dpi
        let words = to_page_words(
            &[ocr_word("성명", 90.0, 2480, 1000)],
            (2480 * 2, 3508),
            (595.0, 842.0),
            35.0,
        );
        assert_eq!(words.len(), 1);
        let b = words[0].bbox;
        assert!((b.x0 - 297.5).abs() < 0.01);
        assert!((b.y0 - 1000.0 * 842.0 / 3508.0).abs() < 0.01);
        assert_eq!(words[0].confidence, Some(90.0));
    }

    #[test]
    fn test_low_confidence_and_blank_dropped() {
        let words = to_page_words(
            &[
                ocr_word("박지호", 20.0, 0, 0),
                ocr_word("  ", 95.0, 0, 0),
                ocr_word("남", 35.0, 0, 0),
            ],
            (1000, 1000),
            (595.0, 842.0),
            35.0,
        );
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["남"]);
    }

    #[test]
    fn test_decomposed_hangul_normalized() {
        // 성 as conjoining jamo
        let words = to_page_words(
            &[ocr_word("\u{1109}\u{1165}\u{11BC}명", 90.0, 0, 0)],
            (100, 100),
            (100.0, 100.0),
            0.0,
        );
        assert_eq!(words[0].text, "성명");
    }

    #[test]
    fn test_default_options() {
        let options = OcrOptions::default().with_dpi(200);
        assert!(options.enabled);
        assert_eq!(options.dpi, 200);
        assert_eq!(options.lang, "kor");
        assert_eq!(options.timeout, Duration::from_secs(60));
    }
}
