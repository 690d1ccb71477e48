//! PDF backend: content-stream interpretation, layout extraction and the
//! destructive redaction primitive, all on top of lopdf.

mod backend;
mod extract;
mod fonts;
mod images;
mod interpreter;
mod options;
mod redact;

pub use backend::{decode_text_simple, LopdfBackend, PageId, PageSink, PdfBackend};
pub use extract::{extract_layout, PageGeometry};
pub use fonts::ToUnicode;
pub use interpreter::{
    ContentVisitor, FormPlacement, Glyph, Interpreter, Matrix, ShowText, TextElement, UserBox, MAX_FORM_DEPTH,
};
pub use options::{ErrorMode, OverflowPolicy, RedactOptions, MAX_PROCESSED_PAGES};
pub use redact::{redact_page, RedactStats};
