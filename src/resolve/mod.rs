//! Field resolution.
//!
//! Every [`TargetField`] is resolved by a [`ResolverChain`]: an ordered list
//! of [`FieldResolver`] strategies tried until one yields rectangles. The
//! anchor-based strategy comes first, a fixed proportional region from the
//! [`TemplateProfile`] last. [`PageResolvers`] runs all chains for a page
//! together with the footer masker, the school-name matcher and the header
//! strip.

mod columns;
mod fixed;
mod footer;
mod labeled;
mod photo;
mod school;
mod sections;

pub use columns::ColumnResolver;
pub use fixed::FixedRegion;
pub use footer::{classify_footer, FooterMasker, FooterOutcome, FooterPartition, TokenKind};
pub use labeled::LabeledLine;
pub use photo::PhotoImage;
pub use school::SchoolMatcher;
pub use sections::SectionBlock;

use crate::error::Result;
use crate::geometry::Rect;
use crate::model::{PageLayout, RedactionRect, TargetField, Warning};
use crate::probe::{LayoutProbe, Needle};
use crate::profile::TemplateProfile;
use crate::shaping::Shaper;

/// Everything a resolver may look at for one page.
pub struct PageContext<'a> {
    pub page: &'a PageLayout,
    pub profile: &'a TemplateProfile,
    pub probe: LayoutProbe<'a>,
    pub shaper: Shaper,
}

impl<'a> PageContext<'a> {
    pub fn new(page: &'a PageLayout, profile: &'a TemplateProfile) -> Self {
        Self {
            page,
            profile,
            probe: LayoutProbe::new(page, profile.line_tolerance),
            shaper: Shaper::new(page.width, page.height, profile.shaping),
        }
    }

    pub fn width(&self) -> f32 {
        self.page.width
    }

    pub fn height(&self) -> f32 {
        self.page.height
    }

    /// Top of the footer band in points.
    pub fn footer_top(&self) -> f32 {
        self.page.height * self.profile.footer_top_frac
    }

    /// Right edge of the table area in points.
    pub fn table_right(&self) -> f32 {
        self.page.width * self.profile.table_right_frac
    }

    /// Occurrences of an anchor label above the footer band.
    pub fn anchors(&self, label: &str) -> Vec<Rect> {
        let footer_top = self.footer_top();
        self.probe
            .find_all(Needle::Label(label))
            .into_iter()
            .map(|m| m.bbox)
            .filter(|r| r.y0 < footer_top)
            .collect()
    }

    /// Locate a structural anchor.
    ///
    /// Records `AnchorNotFound` when absent. With several occurrences the
    /// topmost-then-leftmost one wins and `AmbiguousMatch` is recorded.
    pub fn anchor(&self, label: &str, field: TargetField, diags: &mut Diagnostics) -> Option<Rect> {
        let found = self.anchors(label);
        match found.len() {
            0 => {
                diags.warn(Warning::AnchorNotFound {
                    field,
                    label: label.to_string(),
                });
                None
            }
            1 => found.first().copied(),
            count => {
                diags.warn(Warning::AmbiguousMatch {
                    label: label.to_string(),
                    count,
                });
                found.first().copied()
            }
        }
    }

    /// Shape content sitting in a table cell, recording degenerate results.
    pub fn shape_cell(&self, content: Rect, field: TargetField, diags: &mut Diagnostics) -> Rect {
        let shaped = self.shaper.shape_cell(content, &self.page.rules);
        if shaped.degenerate {
            diags.warn(Warning::GeometryDegenerate { field });
        }
        shaped.rect
    }
}

/// Soft findings collected while resolving one page.
#[derive(Debug, Default)]
pub struct Diagnostics {
    page_index: usize,
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            warnings: Vec::new(),
        }
    }

    /// Record and log a warning.
    pub fn warn(&mut self, warning: Warning) {
        log::warn!("page {}: {}", self.page_index + 1, warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// One way of locating a field on a page.
pub trait FieldResolver: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Rectangles for the field; empty when this strategy does not apply.
    fn resolve(&self, ctx: &PageContext<'_>, diags: &mut Diagnostics) -> Vec<Rect>;
}

/// Ordered fallback chain for one field.
pub struct ResolverChain {
    field: TargetField,
    strategies: Vec<Box<dyn FieldResolver>>,
}

impl ResolverChain {
    pub fn new(field: TargetField) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy to the chain.
    pub fn then(mut self, strategy: impl FieldResolver + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Append a fixed region when the profile provides one.
    pub fn then_fixed(self, region: Option<crate::geometry::FracRect>) -> Self {
        match region {
            Some(region) => self.then(FixedRegion::new(region)),
            None => self,
        }
    }

    pub fn field(&self) -> TargetField {
        self.field
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order; the first non-empty result wins.
    pub fn resolve(&self, ctx: &PageContext<'_>, diags: &mut Diagnostics) -> Vec<RedactionRect> {
        for strategy in &self.strategies {
            let rects = strategy.resolve(ctx, diags);
            if !rects.is_empty() {
                log::debug!(
                    "page {}: {} resolved by {} ({} rects)",
                    ctx.page.index + 1,
                    self.field,
                    strategy.name(),
                    rects.len()
                );
                return rects
                    .into_iter()
                    .map(|r| RedactionRect::new(self.field, r))
                    .collect();
            }
        }
        diags.warn(Warning::FieldSkipped { field: self.field });
        Vec::new()
    }
}

/// All resolvers for a document, built once from a profile.
pub struct PageResolvers {
    structural: Vec<ResolverChain>,
    footer: FooterMasker,
    school: SchoolMatcher,
    header: Option<ResolverChain>,
}

impl PageResolvers {
    pub fn from_profile(profile: &TemplateProfile) -> Result<Self> {
        let labels = &profile.anchors;
        let fallbacks = &profile.fallbacks;

        let structural = vec![
            ResolverChain::new(TargetField::Photo)
                .then(PhotoImage)
                .then_fixed(fallbacks.photo),
            ResolverChain::new(TargetField::ClassColumn)
                .then(ColumnResolver::new(TargetField::ClassColumn, &labels.class))
                .then_fixed(fallbacks.class_table),
            ResolverChain::new(TargetField::NumberColumn)
                .then(ColumnResolver::new(TargetField::NumberColumn, &labels.number))
                .then_fixed(fallbacks.class_table),
            ResolverChain::new(TargetField::TeacherColumn)
                .then(ColumnResolver::new(TargetField::TeacherColumn, &labels.teacher))
                .then_fixed(fallbacks.class_table),
            ResolverChain::new(TargetField::StudentInfoLine)
                .then(LabeledLine::new(
                    TargetField::StudentInfoLine,
                    vec![
                        labels.name.clone(),
                        labels.gender.clone(),
                        labels.resident_number.clone(),
                    ],
                ))
                .then_fixed(fallbacks.student_info),
            ResolverChain::new(TargetField::AddressLine)
                .then(LabeledLine::new(TargetField::AddressLine, vec![labels.address.clone()]))
                .then_fixed(fallbacks.address),
            ResolverChain::new(TargetField::AcademicHistoryBlock)
                .then(
                    SectionBlock::new(
                        TargetField::AcademicHistoryBlock,
                        &labels.academic_history,
                        vec![labels.special_notes.clone(), labels.section_two.clone()],
                        fallbacks.academic_history,
                    )
                    .with_numeral_widening(profile.numeral_regex()?),
                )
                .then_fixed(fallbacks.academic_history),
            ResolverChain::new(TargetField::SpecialNotesBlock)
                .then(SectionBlock::new(
                    TargetField::SpecialNotesBlock,
                    &labels.special_notes,
                    vec![labels.section_two.clone()],
                    fallbacks.special_notes,
                ))
                .then_fixed(fallbacks.special_notes),
        ];

        let header = profile
            .header_strip
            .map(|strip| ResolverChain::new(TargetField::HeaderStrip).then(FixedRegion::new(strip)));

        Ok(Self {
            structural,
            footer: FooterMasker::from_profile(profile),
            school: SchoolMatcher::from_profile(profile)?,
            header,
        })
    }

    /// Resolve every field that applies to this page.
    ///
    /// Structural fields run on the first page only. The footer runs before
    /// the school-name matcher so its keep rectangle can be excluded.
    pub fn resolve_page(&self, ctx: &PageContext<'_>, diags: &mut Diagnostics) -> Vec<RedactionRect> {
        let mut rects = Vec::new();

        if ctx.page.is_first() {
            for chain in &self.structural {
                rects.extend(chain.resolve(ctx, diags));
            }
        }

        let footer = self.footer.resolve(ctx);
        rects.extend(
            footer
                .delete
                .iter()
                .map(|r| RedactionRect::new(TargetField::FooterIdentityBlock, *r)),
        );

        let mut exclusions: Vec<Rect> = footer.keep.into_iter().collect();
        if ctx.page.is_first() {
            exclusions.push(Rect::new(
                0.0,
                0.0,
                ctx.width(),
                ctx.height() * ctx.profile.title_region_frac,
            ));
        }
        rects.extend(
            self.school
                .resolve(ctx, &exclusions, diags)
                .into_iter()
                .map(|r| RedactionRect::new(TargetField::SchoolNameMention, r)),
        );

        if let Some(header) = &self.header {
            rects.extend(header.resolve(ctx, diags));
        }

        rects
    }

    pub fn footer(&self) -> &FooterMasker {
        &self.footer
    }

    pub fn school(&self) -> &SchoolMatcher {
        &self.school
    }
}
