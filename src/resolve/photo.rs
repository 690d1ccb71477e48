use super::{Diagnostics, FieldResolver, PageContext};
use crate::geometry::Rect;
use crate::model::{TargetField, Warning};

/// The ID photo: the largest image in the upper region, rightmost on ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoImage;

impl FieldResolver for PhotoImage {
    fn name(&self) -> &'static str {
        "image"
    }

    fn resolve(&self, ctx: &PageContext<'_>, diags: &mut Diagnostics) -> Vec<Rect> {
        let limit = ctx.height() * ctx.profile.photo_region_frac;

        let best = ctx
            .page
            .images
            .iter()
            .filter(|img| img.bbox.y0 < limit && !img.bbox.is_empty())
            .max_by(|a, b| {
                a.bbox
                    .area()
                    .total_cmp(&b.bbox.area())
                    .then(a.bbox.x0.total_cmp(&b.bbox.x0))
            });

        match best {
            Some(img) => {
                let margin = ctx.profile.photo_margin;
                vec![img.bbox.expand(margin, margin).clamp_to(ctx.width(), ctx.height())]
            }
            None => {
                diags.warn(Warning::AnchorNotFound {
                    field: TargetField::Photo,
                    label: "image".to_string(),
                });
                Vec::new()
            }
        }
    }
}
