//! End-to-end redaction of synthetic transcripts.

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use redactpdf::ocr::{OcrWord, PixelBox};
use redactpdf::{
    Error, LopdfBackend, OcrEngine, OcrFallback, OcrOptions, OverflowPolicy, PageDisposition, PdfBackend,
    Rasterizer, RedactOptions, Redactor, Result, TargetField, TextSource, Warning,
};

use common::{build_pdf, count_operators, transcript_first_page, transcript_later_page, PageDrawing};

const PII: &[&str] = &[
    "박지호",
    "김선생",
    "000000-0000000",
    "서울특별시",
    "테헤란로",
    "대성고등학교",
    "전학",
];

fn redactor() -> Redactor {
    Redactor::new().without_ocr().sequential()
}

fn page_texts(pdf: &[u8], index: usize) -> Vec<String> {
    let backend = LopdfBackend::load_bytes(pdf).unwrap();
    backend
        .extract_words(index)
        .unwrap()
        .into_iter()
        .map(|w| w.text)
        .collect()
}

fn footer_texts(pdf: &[u8], index: usize) -> Vec<String> {
    let backend = LopdfBackend::load_bytes(pdf).unwrap();
    backend
        .extract_words(index)
        .unwrap()
        .into_iter()
        .filter(|w| w.bbox.y0 > 787.0)
        .map(|w| w.text)
        .collect()
}

fn assert_no_pii(texts: &[String]) {
    for text in texts {
        for secret in PII {
            assert!(!text.contains(secret), "'{}' still extractable in '{}'", secret, text);
        }
    }
}

#[test]
fn test_fixture_is_readable_before_redaction() {
    let pdf = build_pdf(&[transcript_first_page()]);
    let texts = page_texts(&pdf, 0);
    assert!(texts.contains(&"박지호".to_string()));
    assert!(texts.contains(&"000000-0000000".to_string()));
    assert!(texts.contains(&"성명:".to_string()));
}

#[test]
fn test_first_page_pii_is_removed() {
    let pdf = build_pdf(&[transcript_first_page(), transcript_later_page(2)]);
    let result = redactor().redact_bytes(&pdf).unwrap();

    let texts = page_texts(&result.bytes, 0);
    assert_no_pii(&texts);

    // Labels survive
    for label in ["성명", "성별", "주민등록번호", "주소", "학적사항", "특기사항"] {
        assert!(texts.iter().any(|t| t.starts_with(label)), "label {} was removed", label);
    }

    let report = &result.report;
    assert_eq!(report.page_count, 2);
    assert_eq!(report.pages.len(), 2);
    let first = &report.pages[0];
    assert_eq!(first.disposition, PageDisposition::Redacted);
    assert_eq!(first.source, TextSource::Digital);
    assert_eq!(first.fields.get(&TargetField::StudentInfoLine), Some(&3));
    assert_eq!(first.fields.get(&TargetField::AddressLine), Some(&1));
    assert!(first.fields.contains_key(&TargetField::AcademicHistoryBlock));
    assert!(first.fields.contains_key(&TargetField::SpecialNotesBlock));
    assert!(first.fields.contains_key(&TargetField::FooterIdentityBlock));
}

#[test]
fn test_footer_keeps_page_counter_only() {
    let pdf = build_pdf(&[transcript_first_page(), transcript_later_page(2)]);
    let result = redactor().redact_bytes(&pdf).unwrap();

    assert_eq!(footer_texts(&result.bytes, 0), vec!["/", "1"]);
    assert_eq!(footer_texts(&result.bytes, 1), vec!["/", "2"]);
}

#[test]
fn test_later_pages_get_school_and_footer_only() {
    let pdf = build_pdf(&[transcript_first_page(), transcript_later_page(2)]);
    let result = redactor().redact_bytes(&pdf).unwrap();

    let texts = page_texts(&result.bytes, 1);
    assert_no_pii(&texts);
    assert!(texts.contains(&"봉사활동".to_string()));
    assert!(texts.contains(&"교내".to_string()));

    let second = &result.report.pages[1];
    assert!(second.fields.contains_key(&TargetField::SchoolNameMention));
    assert!(!second.fields.contains_key(&TargetField::StudentInfoLine));
}

#[test]
fn test_gridlines_survive() {
    let pdf = build_pdf(&[transcript_first_page()]);
    let before = count_operators(&pdf, 1, &["m", "l", "S"]);
    let result = redactor().redact_bytes(&pdf).unwrap();
    let after = count_operators(&result.bytes, 1, &["m", "l", "S"]);
    assert_eq!(before, after);

    let backend = LopdfBackend::load_bytes(&result.bytes).unwrap();
    let rules = backend.page_layout(0).unwrap().rules;
    assert_eq!(rules.len(), 6);
}

#[test]
fn test_class_table_values_and_photo_removed() {
    let pdf = build_pdf(&[transcript_first_page()]);
    assert_eq!(count_operators(&pdf, 1, &["Do"]), 1);
    let before = page_texts(&pdf, 0);
    assert!(before.contains(&"김선생".to_string()));

    let result = redactor().redact_bytes(&pdf).unwrap();
    let first = &result.report.pages[0];
    for field in [
        TargetField::Photo,
        TargetField::ClassColumn,
        TargetField::NumberColumn,
        TargetField::TeacherColumn,
    ] {
        assert_eq!(first.fields.get(&field), Some(&1), "{}", field);
    }
    assert!(!first
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::AnchorNotFound { field: TargetField::Photo, .. })));

    assert_eq!(count_operators(&result.bytes, 1, &["Do"]), 0);
    let backend = LopdfBackend::load_bytes(&result.bytes).unwrap();
    let layout = backend.page_layout(0).unwrap();
    assert!(layout.images.is_empty());

    // Values under 반, 번호 and 담임성명 go; headers and the other columns stay
    let table_row: Vec<&str> = layout
        .words
        .iter()
        .filter(|w| w.bbox.y0 > 45.0 && w.bbox.y1 < 66.0)
        .map(|w| w.text.as_str())
        .collect();
    assert_eq!(table_row, vec!["1", "보통과"]);
    let texts = page_texts(&result.bytes, 0);
    for header in ["학년", "학과", "반", "번호", "담임성명", "인적·학적사항"] {
        assert!(texts.iter().any(|t| t == header), "header {} was removed", header);
    }
}

#[test]
fn test_content_drawn_through_form_is_redacted() {
    let pdf = build_pdf(&[transcript_first_page().as_form(), transcript_later_page(2)]);
    assert!(page_texts(&pdf, 0).contains(&"박지호".to_string()));

    let result = redactor().redact_bytes(&pdf).unwrap();
    let texts = page_texts(&result.bytes, 0);
    assert_no_pii(&texts);
    assert!(!texts.contains(&"김선생".to_string()));
    assert!(texts.contains(&"성명:".to_string()));

    let first = &result.report.pages[0];
    assert_eq!(first.fields.get(&TargetField::StudentInfoLine), Some(&3));
    assert!(!first
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::ContentRetained { .. })));

    let backend = LopdfBackend::load_bytes(&result.bytes).unwrap();
    assert!(backend.page_layout(0).unwrap().images.is_empty());
    assert_eq!(footer_texts(&result.bytes, 0), vec!["/", "1"]);
}

#[test]
fn test_redaction_is_idempotent() {
    let pdf = build_pdf(&[transcript_first_page(), transcript_later_page(2)]);
    let once = redactor().redact_bytes(&pdf).unwrap();
    let twice = redactor().redact_bytes(&once.bytes).unwrap();

    for page in 0..2 {
        assert_eq!(page_texts(&once.bytes, page), page_texts(&twice.bytes, page));
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let pdf = build_pdf(&[
        transcript_first_page(),
        transcript_later_page(2),
        transcript_later_page(3),
    ]);
    let sequential = redactor().redact_bytes(&pdf).unwrap();
    let parallel = Redactor::new().without_ocr().redact_bytes(&pdf).unwrap();

    for page in 0..3 {
        assert_eq!(page_texts(&sequential.bytes, page), page_texts(&parallel.bytes, page));
    }
    let fields = |r: &redactpdf::RedactionResult| -> Vec<_> { r.report.pages.iter().map(|p| p.fields.clone()).collect() };
    assert_eq!(fields(&sequential), fields(&parallel));
}

#[test]
fn test_overflow_pass_through() {
    let pdf = build_pdf(&[
        transcript_first_page(),
        transcript_later_page(2),
        transcript_later_page(3),
    ]);
    let options = RedactOptions::new().without_ocr().with_max_pages(2);
    let result = Redactor::new().with_options(options).redact_bytes(&pdf).unwrap();

    assert_eq!(result.report.pages[2].disposition, PageDisposition::PassedThrough);
    // Untouched
    assert!(page_texts(&result.bytes, 2).contains(&"대성고등학교".to_string()));
}

#[test]
fn test_overflow_drop() {
    let pdf = build_pdf(&[
        transcript_first_page(),
        transcript_later_page(2),
        transcript_later_page(3),
    ]);
    let options = RedactOptions::new()
        .without_ocr()
        .with_max_pages(2)
        .with_overflow(OverflowPolicy::Drop);
    let result = Redactor::new().with_options(options).redact_bytes(&pdf).unwrap();

    assert_eq!(result.report.pages[2].disposition, PageDisposition::Dropped);
    let backend = LopdfBackend::load_bytes(&result.bytes).unwrap();
    assert_eq!(backend.page_count(), 2);
}

#[test]
fn test_missing_anchors_fall_back_to_fixed_regions() {
    let page = PageDrawing::default()
        .text(40.0, 60.0, "학교생활기록부")
        .text(40.0, 820.0, "/ 1");
    let pdf = build_pdf(&[page]);
    let result = redactor().redact_bytes(&pdf).unwrap();

    let first = &result.report.pages[0];
    assert!(first.fields.contains_key(&TargetField::StudentInfoLine));
    assert!(first.fields.contains_key(&TargetField::AddressLine));
    assert!(first
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::AnchorNotFound { field: TargetField::AddressLine, .. })));
}

#[test]
fn test_report_serializes() {
    let pdf = build_pdf(&[transcript_first_page()]);
    let result = redactor().redact_bytes(&pdf).unwrap();
    let json = serde_json::to_value(&result.report).unwrap();

    assert_eq!(json["profile"], "default");
    assert_eq!(json["pages"][0]["disposition"], "redacted");
    assert!(json["pages"][0]["fields"]["student_info_line"].is_number());
}

#[test]
fn test_redact_file_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("transcript.pdf");
    let output = dir.path().join("masked_transcript.pdf");
    std::fs::write(&input, build_pdf(&[transcript_first_page()])).unwrap();

    let result = redactor().redact_file(&input).unwrap();
    result.save(&output).unwrap();
    assert_no_pii(&page_texts(&std::fs::read(&output).unwrap(), 0));
}

#[test]
fn test_inspect_does_not_modify() {
    let pdf = build_pdf(&[transcript_first_page()]);
    let inspection = redactor().inspect_bytes(&pdf, 0).unwrap();
    assert!(!inspection.rects.is_empty());
    assert!(inspection.layout.words.iter().any(|w| w.text == "박지호"));
    assert!(matches!(
        redactor().inspect_bytes(&pdf, 4),
        Err(Error::PageOutOfRange(5, 1))
    ));
}

// ---------------------------------------------------------------------------
// OCR fallback with test doubles
// ---------------------------------------------------------------------------

struct BlankRasterizer;

impl Rasterizer for BlankRasterizer {
    fn render(&self, _document: &Path, _page_index: usize, _dpi: u32) -> Result<DynamicImage> {
        // One pixel per point
        Ok(DynamicImage::new_luma8(595, 842))
    }
}

struct ScriptedEngine {
    calls: Arc<AtomicUsize>,
}

fn ocr_word(text: &str, left: u32, top: u32) -> OcrWord {
    OcrWord {
        text: text.to_string(),
        confidence: 90.0,
        bbox: PixelBox {
            left,
            top,
            width: 9 * text.chars().count() as u32,
            height: 9,
        },
        line: (1, 1, 1),
    }
}

impl OcrEngine for ScriptedEngine {
    fn recognize(&self, _image: &DynamicImage, _lang: &str) -> Result<Vec<OcrWord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            ocr_word("성명:", 40, 150),
            ocr_word("박지호", 76, 150),
            ocr_word("주소:", 40, 176),
            ocr_word("서울특별시", 76, 176),
        ])
    }
}

struct MissingEngine;

impl OcrEngine for MissingEngine {
    fn recognize(&self, _image: &DynamicImage, _lang: &str) -> Result<Vec<OcrWord>> {
        Err(Error::OcrUnavailable("tesseract not found".to_string()))
    }
}

fn scanned_page() -> PageDrawing {
    PageDrawing::default()
        .rule(142.0, 30.0, 580.0)
        .rule(168.0, 30.0, 580.0)
        .rule(192.0, 30.0, 580.0)
}

#[test]
fn test_scanned_page_uses_ocr_words() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ocr = OcrFallback::new(
        Box::new(BlankRasterizer),
        Box::new(ScriptedEngine { calls: calls.clone() }),
        OcrOptions::default(),
    );
    let pdf = build_pdf(&[scanned_page()]);
    let result = Redactor::new().with_ocr_fallback(ocr).redact_bytes(&pdf).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = &result.report.pages[0];
    assert_eq!(first.source, TextSource::Ocr);
    assert_eq!(first.fields.get(&TargetField::StudentInfoLine), Some(&1));
    assert!(!first
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::AnchorNotFound { field: TargetField::StudentInfoLine, .. })));
    assert!(!result.report.ocr_skipped);
}

#[test]
fn test_unavailable_ocr_still_blanks_fixed_regions() {
    let ocr = OcrFallback::new(Box::new(BlankRasterizer), Box::new(MissingEngine), OcrOptions::default());
    let pdf = build_pdf(&[scanned_page()]);
    let result = Redactor::new().with_ocr_fallback(ocr).redact_bytes(&pdf).unwrap();

    assert!(result.report.ocr_skipped);
    let first = &result.report.pages[0];
    assert_eq!(first.source, TextSource::Digital);
    assert!(first
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::OcrEngineUnavailable { .. })));
    assert!(first.fields.contains_key(&TargetField::StudentInfoLine));
    assert!(first.fields.contains_key(&TargetField::Photo));
}

#[test]
fn test_digital_pages_skip_ocr() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ocr = OcrFallback::new(
        Box::new(BlankRasterizer),
        Box::new(ScriptedEngine { calls: calls.clone() }),
        OcrOptions::default(),
    );
    let mut profile = redactpdf::TemplateProfile::default();
    profile.min_text_lines = 3;
    let pdf = build_pdf(&[transcript_first_page()]);
    Redactor::new()
        .with_profile(profile)
        .with_ocr_fallback(ocr)
        .redact_bytes(&pdf)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
