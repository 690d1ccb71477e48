use regex::Regex;

use super::{Diagnostics, PageContext};
use crate::error::Result;
use crate::geometry::Rect;
use crate::model::TargetField;
use crate::probe::{LayoutProbe, Needle};
use crate::profile::TemplateProfile;

/// School-name mentions anywhere on a page.
///
/// Runs the profile's patterns (and known literal names) against visual
/// lines joined back into text, so names split across OCR tokens are still
/// caught. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct SchoolMatcher {
    patterns: Vec<Regex>,
    names: Vec<String>,
}

impl SchoolMatcher {
    pub fn new(patterns: Vec<Regex>, names: Vec<String>) -> Self {
        Self { patterns, names }
    }

    pub fn from_profile(profile: &TemplateProfile) -> Result<Self> {
        Ok(Self::new(profile.school_regexes()?, profile.school_names.clone()))
    }

    /// Raw match boxes, deduplicated, topmost first.
    pub fn find(&self, probe: &LayoutProbe<'_>) -> Vec<Rect> {
        let mut rects: Vec<Rect> = self
            .patterns
            .iter()
            .flat_map(|re| probe.find_all(Needle::Pattern(re)))
            .chain(
                self.names
                    .iter()
                    .flat_map(|name| probe.find_all(Needle::Literal(name))),
            )
            .map(|m| m.bbox)
            .collect();

        rects.sort_by(Rect::reading_order);
        rects.dedup_by(|a, b| same_rect(a, b));
        rects
    }

    /// Shaped rectangles for every match that does not touch an exclusion.
    pub fn resolve(&self, ctx: &PageContext<'_>, exclusions: &[Rect], diags: &mut Diagnostics) -> Vec<Rect> {
        self.find(&ctx.probe)
            .into_iter()
            .filter(|r| !exclusions.iter().any(|ex| ex.intersects(r)))
            .map(|r| ctx.shape_cell(r, TargetField::SchoolNameMention, diags))
            .filter(|r| !exclusions.iter().any(|ex| ex.intersects(r)))
            .collect()
    }
}

fn same_rect(a: &Rect, b: &Rect) -> bool {
    const TOL: f32 = 0.01;
    (a.x0 - b.x0).abs() < TOL
        && (a.y0 - b.y0).abs() < TOL
        && (a.x1 - b.x1).abs() < TOL
        && (a.y1 - b.y1).abs() < TOL
}
