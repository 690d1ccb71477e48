//! Synthetic transcript PDFs for integration tests.
//!
//! Text is drawn with a Type0 font whose ToUnicode CMap maps every code to
//! the Hangul (or ASCII) character it was built from, the way embedded
//! subset fonts in real transcripts are. Every glyph is 1000 units wide.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const FONT_SIZE: f32 = 9.0;

/// One line of text, top-left baseline position in points.
#[derive(Debug, Clone)]
pub struct Line {
    pub x: f32,
    pub baseline: f32,
    pub text: String,
}

/// One page to draw.
#[derive(Debug, Clone, Default)]
pub struct PageDrawing {
    pub lines: Vec<Line>,
    /// Horizontal gridlines as (top-left y, x0, x1)
    pub rules: Vec<(f32, f32, f32)>,
    /// Gray images as top-left (x0, y0, x1, y1)
    pub images: Vec<(f32, f32, f32, f32)>,
    /// Draw everything inside one form XObject instead of the page content
    pub in_form: bool,
}

impl PageDrawing {
    pub fn text(mut self, x: f32, baseline: f32, text: &str) -> Self {
        self.lines.push(Line {
            x,
            baseline,
            text: text.to_string(),
        });
        self
    }

    pub fn rule(mut self, y: f32, x0: f32, x1: f32) -> Self {
        self.rules.push((y, x0, x1));
        self
    }

    pub fn image(mut self, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        self.images.push((x0, y0, x1, y1));
        self
    }

    pub fn as_form(mut self) -> Self {
        self.in_form = true;
        self
    }
}

/// First page of a transcript with every sensitive field filled in.
///
/// Laid out like the default profile's template: the photo and the table
/// values fall inside their fallback regions, the table header row and the
/// section title outside them.
pub fn transcript_first_page() -> PageDrawing {
    PageDrawing::default()
        .text(200.0, 24.0, "학교생활기록부")
        .image(30.0, 48.0, 110.0, 118.0)
        .text(130.0, 40.0, "학년")
        .text(200.0, 40.0, "학과")
        .text(320.0, 40.0, "반")
        .text(390.0, 40.0, "번호")
        .text(480.0, 40.0, "담임성명")
        .text(137.0, 60.0, "1")
        .text(195.0, 60.0, "보통과")
        .text(322.0, 60.0, "7")
        .text(394.0, 60.0, "13")
        .text(485.0, 60.0, "김선생")
        .text(130.0, 134.0, "1. 인적·학적사항")
        .text(40.0, 158.0, "성명: 박지호 성별: 남 주민등록번호: 000000-0000000")
        .text(40.0, 184.0, "주소: 서울특별시 강남구 테헤란로 1")
        .text(40.0, 210.0, "학적사항")
        .text(110.0, 210.0, "2020년 3월 2일 대성고등학교 제1학년 입학")
        .text(40.0, 240.0, "특기사항")
        .text(110.0, 240.0, "전학 사유 없음")
        .text(40.0, 290.0, "2. 출결상황")
        .text(40.0, 820.0, "/ 1 반 7 번호 13 성명 박지호")
        .rule(46.0, 120.0, 580.0)
        .rule(66.0, 120.0, 580.0)
        .rule(142.0, 30.0, 580.0)
        .rule(168.0, 30.0, 580.0)
        .rule(192.0, 30.0, 580.0)
        .rule(275.0, 30.0, 580.0)
}

/// A later page: body text with a school mention and the footer.
pub fn transcript_later_page(number: usize) -> PageDrawing {
    PageDrawing::default()
        .text(40.0, 100.0, "봉사활동 대성고등학교 교내 봉사")
        .text(40.0, 820.0, &format!("/ {} 반 7 번호 13 성명 박지호", number))
        .rule(90.0, 30.0, 580.0)
        .rule(110.0, 30.0, 580.0)
}

/// Build a document from page specs.
pub fn build_pdf(pages: &[PageDrawing]) -> Vec<u8> {
    let mut chars: Vec<char> = pages
        .iter()
        .flat_map(|p| p.lines.iter())
        .flat_map(|l| l.text.chars())
        .collect();
    chars.sort_unstable();
    chars.dedup();
    let code_of = |c: char| chars.binary_search(&c).map(|i| i as u16 + 1).unwrap_or(0);

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = add_font(&mut doc, &chars);
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(4),
            "Height" => Object::Integer(4),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => Object::Integer(8),
        },
        vec![0x40; 16],
    ));

    let mut kids: Vec<Object> = Vec::new();
    for drawing in pages {
        let mut operations = Vec::new();
        for line in &drawing.lines {
            let encoded: Vec<u8> = line
                .text
                .chars()
                .flat_map(|c| code_of(c).to_be_bytes())
                .collect();
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Real(FONT_SIZE)]),
                Operation::new(
                    "Td",
                    vec![Object::Real(line.x), Object::Real(PAGE_HEIGHT - line.baseline)],
                ),
                Operation::new("Tj", vec![Object::String(encoded, StringFormat::Hexadecimal)]),
                Operation::new("ET", vec![]),
            ]);
        }
        for &(x0, y0, x1, y1) in &drawing.images {
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(x1 - x0),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(y1 - y0),
                        Object::Real(x0),
                        Object::Real(PAGE_HEIGHT - y1),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ]);
        }
        operations.push(Operation::new("w", vec![Object::Real(0.5)]));
        for &(y, x0, x1) in &drawing.rules {
            let y = PAGE_HEIGHT - y;
            operations.extend([
                Operation::new("m", vec![Object::Real(x0), Object::Real(y)]),
                Operation::new("l", vec![Object::Real(x1), Object::Real(y)]),
                Operation::new("S", vec![]),
            ]);
        }

        let content = Content { operations }.encode().unwrap_or_default();
        let page_id = if drawing.in_form {
            let form_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(PAGE_WIDTH),
                        Object::Real(PAGE_HEIGHT),
                    ],
                },
                content,
            ));
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"q /Fm0 Do Q".to_vec()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => dictionary! { "Im0" => image_id, "Fm0" => form_id },
                },
            })
        } else {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
        };
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save synthetic pdf");
    out
}

fn add_font(doc: &mut Document, chars: &[char]) -> ObjectId {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CMapName /Synthetic def\n1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    cmap.push_str(&format!("{} beginbfchar\n", chars.len()));
    for (i, c) in chars.iter().enumerate() {
        let mut units = [0u16; 2];
        let hex: String = c
            .encode_utf16(&mut units)
            .iter()
            .map(|u| format!("{:04X}", u))
            .collect();
        cmap.push_str(&format!("<{:04X}> <{}>\n", i + 1, hex));
    }
    cmap.push_str("endbfchar\nendcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));

    let cid_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "NanumGothic",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => Object::Integer(0),
        },
        "DW" => Object::Integer(1000),
    });
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "NanumGothic",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![cid_font.into()],
        "ToUnicode" => cmap_id,
    })
}

/// Count operators of the given names across a page's decoded content.
pub fn count_operators(pdf: &[u8], page: u32, names: &[&str]) -> usize {
    let doc = Document::load_mem(pdf).expect("reload");
    let page_id = doc.get_pages()[&page];
    let content = doc.get_page_content(page_id).expect("page content");
    Content::decode(&content)
        .expect("decode content")
        .operations
        .iter()
        .filter(|op| names.contains(&op.operator.as_str()))
        .count()
}
