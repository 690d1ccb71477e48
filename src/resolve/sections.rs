use regex::Regex;

use super::{Diagnostics, FieldResolver, PageContext};
use crate::geometry::{FracRect, Rect};
use crate::lines::{bounding_rect, group_into_lines};
use crate::model::{TargetField, Warning};

/// A multi-line block introduced by a label ("학적사항", "특기사항").
///
/// The block runs from the label down to the first of `end_labels` found
/// below it. Content to the right of the label is blanked line by line.
/// With numeral widening enabled, lines carrying short digit runs (years,
/// dates) are blanked a second time with a wider horizontal margin.
#[derive(Debug, Clone)]
pub struct SectionBlock {
    field: TargetField,
    label: String,
    end_labels: Vec<String>,
    fallback: Option<FracRect>,
    numerals: Option<Regex>,
}

impl SectionBlock {
    pub fn new(field: TargetField, label: &str, end_labels: Vec<String>, fallback: Option<FracRect>) -> Self {
        Self {
            field,
            label: label.to_string(),
            end_labels,
            fallback,
            numerals: None,
        }
    }

    pub fn with_numeral_widening(mut self, pattern: Regex) -> Self {
        self.numerals = Some(pattern);
        self
    }

    fn block_bottom(&self, ctx: &PageContext<'_>, anchor: &Rect) -> f32 {
        let eps = ctx.profile.anchor_epsilon;
        self.end_labels
            .iter()
            .find_map(|label| {
                ctx.anchors(label)
                    .into_iter()
                    .find(|r| r.y0 > anchor.y1)
                    .map(|r| r.y0 - eps)
            })
            .or_else(|| {
                self.fallback
                    .map(|f| f.y1 * ctx.height())
                    .filter(|y| *y > anchor.y1)
            })
            .unwrap_or(anchor.y1 + eps)
    }
}

impl FieldResolver for SectionBlock {
    fn name(&self) -> &'static str {
        "section"
    }

    fn resolve(&self, ctx: &PageContext<'_>, diags: &mut Diagnostics) -> Vec<Rect> {
        let Some(anchor) = ctx.anchor(&self.label, self.field, diags) else {
            return Vec::new();
        };

        let eps = ctx.profile.anchor_epsilon;
        let top = anchor.y0 - eps;
        let bottom = self.block_bottom(ctx, &anchor);
        let x0 = anchor.x1 + ctx.profile.column_margin;
        let x1 = ctx.table_right();
        log::debug!(
            "{} block [{:.1}, {:.1}] x [{:.1}, {:.1}]",
            self.field,
            top,
            bottom,
            x0,
            x1
        );

        let words: Vec<_> = ctx
            .probe
            .words_in_band(top, bottom, Some(x0), Some(x1))
            .into_iter()
            .filter(|w| {
                let cy = w.bbox.center_y();
                w.bbox.center_x() > x0 && cy > top && cy < bottom
            })
            .collect();

        if words.is_empty() {
            let shaped = ctx.shaper.shape(Rect::new(x0, top, x1, bottom));
            if shaped.degenerate {
                diags.warn(Warning::GeometryDegenerate { field: self.field });
            }
            return vec![shaped.rect];
        }

        let lines = group_into_lines(words, ctx.profile.line_tolerance);
        let mut rects: Vec<Rect> = lines
            .iter()
            .filter_map(|line| bounding_rect(line, Some(x0), Some(x1)))
            .map(|content| ctx.shape_cell(content, self.field, diags))
            .collect();

        if let Some(numerals) = &self.numerals {
            let pad = ctx.profile.numeral_pad;
            for line in &lines {
                if !line.iter().any(|w| numerals.is_match(&w.text)) {
                    continue;
                }
                if let Some(content) = bounding_rect(line, Some(x0), Some(x1)) {
                    let widened = content.expand(pad, 0.0).clip_x(x0, x1);
                    rects.push(ctx.shape_cell(widened, self.field, diags));
                }
            }
        }
        rects
    }
}
