use super::{Diagnostics, FieldResolver, PageContext};
use crate::geometry::{FracRect, Rect};

/// Proportional page region taken from the profile.
///
/// Depends only on the page size, never on extracted content.
#[derive(Debug, Clone, Copy)]
pub struct FixedRegion {
    region: FracRect,
}

impl FixedRegion {
    pub fn new(region: FracRect) -> Self {
        Self { region }
    }
}

impl FieldResolver for FixedRegion {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn resolve(&self, ctx: &PageContext<'_>, _diags: &mut Diagnostics) -> Vec<Rect> {
        let rect = self.region.to_rect(ctx.width(), ctx.height());
        if rect.is_empty() {
            Vec::new()
        } else {
            vec![rect]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageLayout, Word};
    use crate::profile::TemplateProfile;

    #[test]
    fn test_fixed_region_ignores_content() {
        let profile = TemplateProfile::default();
        let empty = PageLayout::a4(0);
        let busy = PageLayout::a4(0).with_words(vec![Word::new("x", Rect::new(1.0, 1.0, 2.0, 2.0))]);
        let region = FixedRegion::new(FracRect::new(0.1, 0.2, 0.5, 0.3));

        let a = region.resolve(&PageContext::new(&empty, &profile), &mut Diagnostics::new(0));
        let b = region.resolve(&PageContext::new(&busy, &profile), &mut Diagnostics::new(0));
        assert_eq!(a, b);
        assert!((a[0].x0 - 59.5).abs() < 1e-3);
    }
}
