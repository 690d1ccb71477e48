//! Per-page redaction planning.
//!
//! A [`RedactionPlan`] collects every rectangle resolved for one page and is
//! consumed exactly once by [`RedactionPlan::commit`], which hands the
//! rectangles to a [`RedactionSink`] and applies them in a single step.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{RedactionRect, TargetField};

/// The destructive blank-out primitive for one page.
pub trait RedactionSink {
    /// Queue a rectangle.
    fn mark(&mut self, rect: &RedactionRect);

    /// Apply every queued rectangle irreversibly, all at once.
    fn apply(&mut self) -> Result<()>;
}

/// Rectangles pending for one page.
#[derive(Debug, Clone, Default)]
pub struct RedactionPlan {
    page_index: usize,
    rects: Vec<RedactionRect>,
}

impl RedactionPlan {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            rects: Vec::new(),
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Queue a rectangle. Empty rectangles are ignored.
    pub fn add(&mut self, rect: RedactionRect) {
        if rect.bbox.is_empty() {
            log::debug!(
                "page {}: dropping empty {} rectangle",
                self.page_index + 1,
                rect.field
            );
            return;
        }
        self.rects.push(rect);
    }

    pub fn extend(&mut self, rects: impl IntoIterator<Item = RedactionRect>) {
        for rect in rects {
            self.add(rect);
        }
    }

    pub fn rects(&self) -> &[RedactionRect] {
        &self.rects
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Rectangle count per field.
    pub fn field_counts(&self) -> BTreeMap<TargetField, usize> {
        let mut counts = BTreeMap::new();
        for rect in &self.rects {
            *counts.entry(rect.field).or_insert(0) += 1;
        }
        counts
    }

    /// Submit every rectangle and apply once. An empty plan does nothing.
    pub fn commit<S: RedactionSink + ?Sized>(self, sink: &mut S) -> Result<usize> {
        if self.rects.is_empty() {
            return Ok(0);
        }
        for rect in &self.rects {
            sink.mark(rect);
        }
        sink.apply()?;
        log::info!(
            "page {}: committed {} rectangles",
            self.page_index + 1,
            self.rects.len()
        );
        Ok(self.rects.len())
    }
}
