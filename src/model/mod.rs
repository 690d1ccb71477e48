//! Data model shared by the layout probe, the resolvers and the backend.
//!
//! Pages are read-only snapshots of what the extraction (or OCR) collaborator
//! saw. Resolvers turn them into [`RedactionRect`]s tagged with a
//! [`TargetField`]; the backend consumes those rectangles.

mod field;
mod page;
mod report;

pub use field::{Color, RedactionRect, TargetField};
pub use page::{ImageBlock, PageLayout, Rule, TextSource, Word};
pub use report::{PageDisposition, PageReport, RedactionReport, Warning};
