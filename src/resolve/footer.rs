//! Per-page footer masking.
//!
//! The footer line mixes school name, class, number and student name with a
//! "current / total" page counter. The counter is kept; everything to its
//! left and right is blanked across the full band height, which catches
//! identity tokens whatever their spelling.

use super::PageContext;
use crate::geometry::Rect;
use crate::model::Word;
use crate::profile::TemplateProfile;

/// Role of a footer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// All ASCII digits
    Numeric,
    /// The page-counter separator "/"
    Separator,
    /// A whole "n/m" counter in one token
    Counter,
    /// Anything else
    Label,
}

impl TokenKind {
    pub fn of(text: &str) -> Self {
        let text = text.trim();
        if text == "/" {
            return TokenKind::Separator;
        }
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            return TokenKind::Numeric;
        }
        if let Some((left, right)) = text.split_once('/') {
            let digits = |s: &str| {
                let s = s.trim();
                !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
            };
            if digits(left) && digits(right) {
                return TokenKind::Counter;
            }
        }
        TokenKind::Label
    }
}

/// Keep/delete split of the footer tokens.
#[derive(Debug, Clone, Default)]
pub struct FooterPartition<'a> {
    pub keep: Vec<&'a Word>,
    pub delete: Vec<&'a Word>,
}

impl FooterPartition<'_> {
    /// Box enclosing the kept tokens.
    pub fn keep_bounds(&self) -> Option<Rect> {
        let mut iter = self.keep.iter();
        let first = iter.next()?;
        Some(iter.fold(first.bbox, |acc, w| acc.union(&w.bbox)))
    }
}

/// Split footer tokens into the page counter (kept) and everything else.
///
/// The separator is the first standalone "/" (left to right) with a numeric
/// neighbour; failing that, the first "/" at all. The nearest numeric token
/// on each side of it, by distance from its center, is kept with it. A
/// single-token counter such as "3/16" is kept on its own. Without any
/// separator every token is a delete target.
pub fn classify_footer<'a>(words: &[&'a Word]) -> FooterPartition<'a> {
    let mut sorted: Vec<&Word> = words.to_vec();
    sorted.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));

    let nearest = |sep: &Word, left: bool| -> Option<usize> {
        let cx = sep.bbox.center_x();
        sorted
            .iter()
            .enumerate()
            .filter(|(_, w)| TokenKind::of(&w.text) == TokenKind::Numeric)
            .filter(|(_, w)| {
                if left {
                    w.bbox.center_x() < cx
                } else {
                    w.bbox.center_x() > cx
                }
            })
            .min_by(|(_, a), (_, b)| {
                (a.bbox.center_x() - cx)
                    .abs()
                    .total_cmp(&(b.bbox.center_x() - cx).abs())
            })
            .map(|(i, _)| i)
    };

    let separators: Vec<usize> = sorted
        .iter()
        .enumerate()
        .filter(|(_, w)| TokenKind::of(&w.text) == TokenKind::Separator)
        .map(|(i, _)| i)
        .collect();

    let chosen = separators
        .iter()
        .copied()
        .find(|&i| nearest(sorted[i], true).is_some() || nearest(sorted[i], false).is_some())
        .or_else(|| separators.first().copied());

    let keep_idx: Vec<usize> = match chosen {
        Some(sep) => [Some(sep), nearest(sorted[sep], true), nearest(sorted[sep], false)]
            .into_iter()
            .flatten()
            .collect(),
        None => sorted
            .iter()
            .position(|w| TokenKind::of(&w.text) == TokenKind::Counter)
            .into_iter()
            .collect(),
    };

    let mut partition = FooterPartition::default();
    for (i, word) in sorted.into_iter().enumerate() {
        if keep_idx.contains(&i) {
            partition.keep.push(word);
        } else {
            partition.delete.push(word);
        }
    }
    partition
}

/// Result of masking one page's footer.
#[derive(Debug, Clone, PartialEq)]
pub struct FooterOutcome {
    /// The footer band
    pub band: Rect,
    /// Protected page-counter zone, margin included
    pub keep: Option<Rect>,
    /// Rectangles to blank
    pub delete: Vec<Rect>,
}

/// Footer identity masker.
#[derive(Debug, Clone, Copy)]
pub struct FooterMasker {
    top_frac: f32,
    keep_margin: f32,
}

impl FooterMasker {
    pub fn new(top_frac: f32, keep_margin: f32) -> Self {
        Self {
            top_frac,
            keep_margin,
        }
    }

    pub fn from_profile(profile: &TemplateProfile) -> Self {
        Self::new(profile.footer_top_frac, profile.footer_keep_margin)
    }

    /// Compute keep and delete rectangles for the footer band.
    ///
    /// Delete rectangles span the full band height on both sides of the
    /// keep zone. With no counter found the whole band is blanked.
    pub fn mask(&self, words: &[Word], page_width: f32, page_height: f32) -> FooterOutcome {
        let band = Rect::new(0.0, page_height * self.top_frac, page_width, page_height);
        let in_band: Vec<&Word> = words
            .iter()
            .filter(|w| w.bbox.center_y() >= band.y0 && w.bbox.center_y() <= band.y1)
            .collect();

        let partition = classify_footer(&in_band);
        let Some(kept) = partition.keep_bounds() else {
            log::debug!("footer: no page counter, blanking whole band");
            return FooterOutcome {
                band,
                keep: None,
                delete: vec![band],
            };
        };

        let keep = Rect::new(
            (kept.x0 - self.keep_margin).max(0.0),
            band.y0,
            (kept.x1 + self.keep_margin).min(page_width),
            band.y1,
        );
        let delete = [
            Rect::new(0.0, band.y0, keep.x0, band.y1),
            Rect::new(keep.x1, band.y0, page_width, band.y1),
        ]
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();

        FooterOutcome {
            band,
            keep: Some(keep),
            delete,
        }
    }

    pub fn resolve(&self, ctx: &PageContext<'_>) -> FooterOutcome {
        self.mask(&ctx.page.words, ctx.width(), ctx.height())
    }
}
