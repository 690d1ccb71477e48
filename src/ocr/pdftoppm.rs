//! Page rasterization through poppler's `pdftoppm`.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use image::DynamicImage;

use super::process::run_bounded;
use super::Rasterizer;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: String,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "pdftoppm".to_string(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn render(&self, document: &Path, page_index: usize, dpi: u32) -> Result<DynamicImage> {
        let dir = tempfile::tempdir()?;
        let prefix = dir.path().join("page");
        let page = (page_index + 1).to_string();

        let mut command = Command::new(&self.program);
        command
            .args(["-png", "-singlefile", "-r", &dpi.to_string()])
            .args(["-f", &page, "-l", &page])
            .arg(document)
            .arg(&prefix);
        let output = run_bounded(command, &self.program, self.timeout)?;

        if !output.status.success() {
            return Err(Error::Raster(format!(
                "pdftoppm failed on page {}: {}",
                page,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let png = prefix.with_extension("png");
        let image = image::open(&png).map_err(|e| Error::Raster(format!("{}: {}", png.display(), e)))?;
        log::debug!(
            "page {}: rasterized at {} dpi ({}x{})",
            page,
            dpi,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
