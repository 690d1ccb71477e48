//! `tesseract` command-line engine (TSV output).

use std::process::Command;
use std::time::Duration;

use image::DynamicImage;

use super::process::run_bounded;
use super::{OcrEngine, OcrWord, PixelBox};
use crate::error::{Error, Result};

/// Word rows carry level 5 in tesseract's TSV.
const WORD_LEVEL: u32 = 5;

/// Runs the `tesseract` executable on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "tesseract".to_string(),
            timeout,
        }
    }

    /// Use a specific executable instead of `tesseract` on the PATH.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<Vec<OcrWord>> {
        let tmp = tempfile::Builder::new()
            .prefix("redactpdf-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(tmp.path(), image::ImageFormat::Png)?;

        let mut command = Command::new(&self.program);
        command
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .arg("tsv");
        let output = run_bounded(command, &self.program, self.timeout)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr(format!("tesseract failed: {}", stderr.trim())));
        }
        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse tesseract TSV output into word rows.
///
/// Header, non-word rows, rows with negative confidence and blank text are
/// skipped.
pub fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            if cols.len() < 12 {
                return None;
            }
            let int = |i: usize| cols[i].trim().parse::<u32>().ok();
            if int(0)? != WORD_LEVEL {
                return None;
            }
            let confidence: f32 = cols[10].trim().parse().ok()?;
            let text = cols[11].trim();
            if text.is_empty() || confidence < 0.0 {
                return None;
            }
            Some(OcrWord {
                text: text.to_string(),
                confidence,
                bbox: PixelBox {
                    left: int(6)?,
                    top: int(7)?,
                    width: int(8)?,
                    height: int(9)?,
                },
                line: (int(2)?, int(3)?, int(4)?),
            })
        })
        .collect()
}
