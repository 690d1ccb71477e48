use super::{Diagnostics, FieldResolver, PageContext};
use crate::geometry::Rect;
use crate::model::TargetField;

/// A labelled line such as "성명: … 성별: … 주민등록번호: …".
///
/// The first label locates the line. Every label found on that line opens a
/// segment running from its right edge to the next label (or the table's
/// right edge), and each segment is blanked as a whole. Labels themselves
/// are left in place.
#[derive(Debug, Clone)]
pub struct LabeledLine {
    field: TargetField,
    labels: Vec<String>,
}

impl LabeledLine {
    pub fn new(field: TargetField, labels: Vec<String>) -> Self {
        Self { field, labels }
    }
}

impl FieldResolver for LabeledLine {
    fn name(&self) -> &'static str {
        "label"
    }

    fn resolve(&self, ctx: &PageContext<'_>, diags: &mut Diagnostics) -> Vec<Rect> {
        let Some(primary) = self.labels.first() else {
            return Vec::new();
        };
        let Some(anchor) = ctx.anchor(primary, self.field, diags) else {
            return Vec::new();
        };

        let eps = ctx.profile.anchor_epsilon;
        let margin = ctx.profile.column_margin;
        let (band_y0, band_y1) = (anchor.y0 - eps, anchor.y1 + eps);
        let on_line = |r: &Rect| r.center_y() >= band_y0 && r.center_y() <= band_y1;

        let mut line_anchors: Vec<Rect> = self
            .labels
            .iter()
            .flat_map(|label| ctx.anchors(label))
            .filter(on_line)
            .collect();
        line_anchors.sort_by(|a, b| a.x0.total_cmp(&b.x0));

        let right_edge = ctx.table_right();
        let mut rects = Vec::new();
        for (i, label) in line_anchors.iter().enumerate() {
            let x0 = label.x1 + margin;
            let x1 = line_anchors
                .get(i + 1)
                .map_or(right_edge, |next| next.x0 - margin);
            if x1 <= x0 {
                continue;
            }

            let mut content = Rect::new(x0, band_y0, x1, band_y1);
            for w in ctx.probe.words_in_band(band_y0, band_y1, Some(x0), Some(x1)) {
                let cx = w.bbox.center_x();
                if cx > x0 && cx < x1 && on_line(&w.bbox) {
                    content = content.union(&w.bbox.clip_x(x0, x1));
                }
            }
            rects.push(ctx.shape_cell(content, self.field, diags));
        }
        rects
    }
}
