use super::{Diagnostics, FieldResolver, PageContext};
use crate::geometry::Rect;
use crate::lines::{bounding_rect, group_into_lines};
use crate::model::TargetField;

/// One column of the class/teacher table, located from its header cell.
///
/// Column boundaries sit halfway between adjacent header boxes on the
/// header row, so centered cell content wider than its header still falls
/// in the right column. The last column extends to the table's right edge.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    field: TargetField,
    header: String,
}

impl ColumnResolver {
    pub fn new(field: TargetField, header: &str) -> Self {
        Self {
            field,
            header: header.to_string(),
        }
    }

    /// Horizontal window `[left, right]` of the column under `header`.
    fn window(&self, ctx: &PageContext<'_>, header: &Rect) -> (f32, f32) {
        let labels = &ctx.profile.anchors;
        let row_tolerance = ctx.profile.line_tolerance * 2.0;

        let mut row: Vec<Rect> = [
            &labels.grade,
            &labels.department,
            &labels.class,
            &labels.number,
            &labels.teacher,
        ]
        .iter()
        .filter_map(|label| {
            ctx.anchors(label)
                .into_iter()
                .find(|r| (r.y0 - header.y0).abs() <= row_tolerance)
        })
        .collect();
        row.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        row.dedup_by(|a, b| (a.x0 - b.x0).abs() < f32::EPSILON);

        let prev = row.iter().rev().find(|r| r.x1 <= header.x0 + f32::EPSILON);
        let next = row.iter().find(|r| r.x0 >= header.x1 - f32::EPSILON);

        let left = match prev {
            Some(p) => (p.x1 + header.x0) / 2.0,
            None => header.x0 - header.width(),
        };
        let right = match next {
            Some(n) => (header.x1 + n.x0) / 2.0,
            None => ctx.table_right(),
        };
        (left, right)
    }

    /// Bottom of the table band: just above the first section title.
    fn band_bottom(&self, ctx: &PageContext<'_>, header: &Rect) -> f32 {
        let eps = ctx.profile.anchor_epsilon;
        ctx.anchors(&ctx.profile.anchors.section_one)
            .into_iter()
            .find(|r| r.y0 > header.y1)
            .map(|r| r.y0 - eps)
            .or_else(|| {
                ctx.profile
                    .fallbacks
                    .class_table
                    .map(|f| f.y1 * ctx.height())
            })
            .unwrap_or(ctx.height() * ctx.profile.photo_region_frac)
    }
}

impl FieldResolver for ColumnResolver {
    fn name(&self) -> &'static str {
        "column"
    }

    fn resolve(&self, ctx: &PageContext<'_>, diags: &mut Diagnostics) -> Vec<Rect> {
        let Some(header) = ctx.anchor(&self.header, self.field, diags) else {
            return Vec::new();
        };

        let (left, right) = self.window(ctx, &header);
        let bottom = self.band_bottom(ctx, &header);
        let margin = ctx.profile.column_margin;
        log::debug!(
            "{} column window [{:.1}, {:.1}], rows to {:.1}",
            self.field,
            left,
            right,
            bottom
        );

        let words: Vec<_> = ctx
            .probe
            .words_in_band(header.y1, bottom, Some(left), Some(right))
            .into_iter()
            .filter(|w| {
                let (cx, cy) = (w.bbox.center_x(), w.bbox.center_y());
                cy > header.y1 && cy < bottom && cx > left && cx < right
            })
            .collect();

        group_into_lines(words, ctx.profile.line_tolerance)
            .iter()
            .filter_map(|line| bounding_rect(line, Some(left + margin), Some(right - margin)))
            .map(|content| ctx.shape_cell(content, self.field, diags))
            .collect()
    }
}
