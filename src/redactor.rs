//! Document pipeline.
//!
//! Pages are extracted in order, planned independently (in parallel when
//! enabled, OCR included), then committed one by one in page order so each
//! page's rectangles are applied in a single destructive step.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tempfile::NamedTempFile;

use crate::detect::detect_format_from_bytes;
use crate::error::{Error, Result};
use crate::model::{
    PageDisposition, PageLayout, PageReport, RedactionRect, RedactionReport, TextSource, Warning, Word,
};
use crate::ocr::OcrFallback;
use crate::parser::{ErrorMode, LopdfBackend, OverflowPolicy, PageSink, PdfBackend, RedactOptions};
use crate::plan::RedactionPlan;
use crate::probe::LayoutProbe;
use crate::profile::TemplateProfile;
use crate::resolve::{Diagnostics, PageContext, PageResolvers};

/// Output of a redaction run.
#[derive(Debug, Clone)]
pub struct RedactionResult {
    /// The redacted PDF
    pub bytes: Vec<u8>,
    pub report: RedactionReport,
}

impl RedactionResult {
    /// Write the redacted PDF to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// What the resolvers produced for one page, without committing it.
#[derive(Debug, Clone)]
pub struct PageInspection {
    pub layout: PageLayout,
    pub rects: Vec<RedactionRect>,
    pub warnings: Vec<Warning>,
}

struct PlannedPage {
    plan: RedactionPlan,
    report: PageReport,
}

/// Redaction engine builder.
///
/// # Example
///
/// ```no_run
/// use redactpdf::Redactor;
///
/// let result = Redactor::new().without_ocr().redact_file("transcript.pdf")?;
/// result.save("masked_transcript.pdf")?;
/// println!("{} rectangles", result.report.rect_count());
/// # Ok::<(), redactpdf::Error>(())
/// ```
pub struct Redactor {
    profile: TemplateProfile,
    options: RedactOptions,
    ocr: Option<OcrFallback>,
}

impl Redactor {
    /// Create a redactor with the default profile and options.
    pub fn new() -> Self {
        Self {
            profile: TemplateProfile::default(),
            options: RedactOptions::default(),
            ocr: None,
        }
    }

    pub fn with_profile(mut self, profile: TemplateProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_options(mut self, options: RedactOptions) -> Self {
        self.options = options;
        self
    }

    /// Use custom OCR collaborators instead of `pdftoppm` + `tesseract`.
    pub fn with_ocr_fallback(mut self, ocr: OcrFallback) -> Self {
        self.options.ocr = ocr.options().clone();
        self.ocr = Some(ocr);
        self
    }

    pub fn without_ocr(mut self) -> Self {
        self.options = self.options.without_ocr();
        self
    }

    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    pub fn lenient(mut self) -> Self {
        self.options = self.options.lenient();
        self
    }

    pub fn profile(&self) -> &TemplateProfile {
        &self.profile
    }

    pub fn options(&self) -> &RedactOptions {
        &self.options
    }

    /// Redact a PDF file.
    pub fn redact_file(&self, path: impl AsRef<Path>) -> Result<RedactionResult> {
        let data = std::fs::read(path.as_ref())?;
        self.redact_bytes(&data)
    }

    /// Redact a PDF held in memory.
    ///
    /// Fails only when the input cannot be loaded as a PDF (or, in strict
    /// mode, when a page's content cannot be read). Every per-field problem
    /// is recorded in the report instead.
    pub fn redact_bytes(&self, data: &[u8]) -> Result<RedactionResult> {
        self.profile.validate()?;
        detect_format_from_bytes(data)?;
        let resolvers = PageResolvers::from_profile(&self.profile)?;
        let mut backend = LopdfBackend::load_bytes(data)?;

        let page_count = backend.page_count();
        let processed = page_count.min(self.options.max_pages);
        log::info!(
            "redacting {} of {} pages with profile '{}'",
            processed,
            page_count,
            self.profile.name
        );

        let layouts = self.extract_layouts(&backend, processed)?;

        let ocr_source = self.ocr_source(data, &layouts)?;
        let ocr_skipped = AtomicBool::new(false);
        let plan_page = |(index, layout): (usize, PageLayout)| {
            self.plan_page(index, layout, &resolvers, ocr_source.as_ref(), &ocr_skipped)
        };
        let planned: Vec<PlannedPage> = if self.options.parallel {
            layouts.into_par_iter().enumerate().map(plan_page).collect()
        } else {
            layouts.into_iter().enumerate().map(plan_page).collect()
        };

        let mut report = RedactionReport {
            profile: self.profile.name.clone(),
            page_count,
            pages: Vec::with_capacity(page_count),
            ocr_skipped: ocr_skipped.load(Ordering::Relaxed),
        };

        for PlannedPage { plan, report: mut page_report } in planned {
            page_report.fields = plan.field_counts();
            let mut sink = PageSink::new(&mut backend, plan.page_index());
            plan.commit(&mut sink)?;
            let stats = sink.stats();
            if stats.retained() > 0 {
                let warning = Warning::ContentRetained {
                    images: stats.images_skipped,
                    forms: stats.forms_skipped,
                };
                log::warn!("page {}: {}", page_report.index + 1, warning);
                page_report.warnings.push(warning);
            }
            report.pages.push(page_report);
        }

        let overflow: Vec<usize> = (processed..page_count).collect();
        if !overflow.is_empty() {
            let disposition = match self.options.overflow {
                OverflowPolicy::PassThrough => PageDisposition::PassedThrough,
                OverflowPolicy::Drop => {
                    backend.drop_pages(&overflow)?;
                    PageDisposition::Dropped
                }
            };
            log::info!("{} pages beyond the cap: {:?}", overflow.len(), disposition);
            report
                .pages
                .extend(overflow.iter().map(|&i| PageReport::new(i, disposition)));
        }

        let bytes = backend.save()?;
        Ok(RedactionResult { bytes, report })
    }

    /// Resolve one page without modifying anything. OCR is not run.
    pub fn inspect_bytes(&self, data: &[u8], index: usize) -> Result<PageInspection> {
        self.profile.validate()?;
        detect_format_from_bytes(data)?;
        let resolvers = PageResolvers::from_profile(&self.profile)?;
        let backend = LopdfBackend::load_bytes(data)?;
        let layout = backend.page_layout(index)?;

        let mut diags = Diagnostics::new(index);
        let rects = {
            let ctx = PageContext::new(&layout, &self.profile);
            resolvers.resolve_page(&ctx, &mut diags)
        };
        Ok(PageInspection {
            layout,
            rects,
            warnings: diags.into_warnings(),
        })
    }

    /// Extraction reads the shared document and stays sequential; planning
    /// works on owned layouts and may run in parallel.
    fn extract_layouts<B: PdfBackend + ?Sized>(&self, backend: &B, processed: usize) -> Result<Vec<PageLayout>> {
        (0..processed)
            .map(|index| match backend.page_layout(index) {
                Ok(layout) => Ok(layout),
                Err(e) if self.options.error_mode == ErrorMode::Lenient => {
                    log::warn!("page {}: content unreadable ({}), using fixed regions", index + 1, e);
                    let (width, height) = backend.page_size(index)?;
                    Ok(PageLayout::new(index, width, height))
                }
                Err(e) => Err(e),
            })
            .collect()
    }

    fn needs_ocr(&self, layout: &PageLayout) -> bool {
        LayoutProbe::new(layout, self.profile.line_tolerance).line_count() < self.profile.min_text_lines
    }

    /// Copy of the input on disk for the rasterizer, written only when
    /// some page looks scanned.
    fn ocr_source(&self, data: &[u8], layouts: &[PageLayout]) -> Result<Option<NamedTempFile>> {
        if !self.options.ocr.enabled || !layouts.iter().any(|l| self.needs_ocr(l)) {
            return Ok(None);
        }
        let mut file = tempfile::Builder::new()
            .prefix("redactpdf-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(Some(file))
    }

    fn plan_page(
        &self,
        index: usize,
        mut layout: PageLayout,
        resolvers: &PageResolvers,
        ocr_source: Option<&NamedTempFile>,
        ocr_skipped: &AtomicBool,
    ) -> PlannedPage {
        let mut diags = Diagnostics::new(index);

        if let Some(source) = ocr_source.filter(|_| self.needs_ocr(&layout)) {
            if !ocr_skipped.load(Ordering::Relaxed) {
                match self.recognize(source.path(), &layout) {
                    Ok(words) => {
                        layout.words = merge_words(std::mem::take(&mut layout.words), words);
                        layout.source = TextSource::Ocr;
                    }
                    Err(Error::OcrUnavailable(message)) => {
                        ocr_skipped.store(true, Ordering::Relaxed);
                        diags.warn(Warning::OcrEngineUnavailable { message });
                    }
                    Err(Error::Timeout(_, seconds)) => diags.warn(Warning::OcrTimeout { seconds }),
                    Err(e) => diags.warn(Warning::OcrFailed { message: e.to_string() }),
                }
            }
        }

        let mut plan = RedactionPlan::new(index);
        {
            let ctx = PageContext::new(&layout, &self.profile);
            plan.extend(resolvers.resolve_page(&ctx, &mut diags));
        }

        let mut report = PageReport::new(index, PageDisposition::Redacted);
        report.source = layout.source;
        report.warnings = diags.into_warnings();
        PlannedPage { plan, report }
    }

    fn recognize(&self, source: &Path, layout: &PageLayout) -> Result<Vec<Word>> {
        let size = (layout.width, layout.height);
        match &self.ocr {
            Some(ocr) => ocr.recognize_page(source, layout.index, size),
            None => OcrFallback::command_line(self.options.ocr.clone()).recognize_page(source, layout.index, size),
        }
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

/// Add recognized words that do not overlap any extracted word.
fn merge_words(mut digital: Vec<Word>, recognized: Vec<Word>) -> Vec<Word> {
    let extra: Vec<Word> = recognized
        .into_iter()
        .filter(|r| !digital.iter().any(|d| d.bbox.intersects(&r.bbox)))
        .collect();
    digital.extend(extra);
    digital
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn test_rejects_non_pdf() {
        let result = Redactor::new().without_ocr().redact_bytes(b"plain text, not a pdf");
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        let result = Redactor::new().without_ocr().redact_bytes(b"%PDF-1.7\n1 0 obj\n<<");
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_words_prefers_digital() {
        let digital = vec![Word::new("성명", Rect::new(10.0, 10.0, 30.0, 20.0))];
        let recognized = vec![
            Word::recognized("성영", Rect::new(11.0, 11.0, 29.0, 19.0), 80.0),
            Word::recognized("박지호", Rect::new(40.0, 10.0, 70.0, 20.0), 90.0),
        ];
        let merged = merge_words(digital, recognized);
        let texts: Vec<&str> = merged.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["성명", "박지호"]);
    }

    #[test]
    fn test_builder_flags() {
        let redactor = Redactor::new().without_ocr().sequential().lenient();
        assert!(!redactor.options().ocr.enabled);
        assert!(!redactor.options().parallel);
        assert_eq!(redactor.options().error_mode, ErrorMode::Lenient);
        assert_eq!(redactor.profile().name, "default");
    }
}
