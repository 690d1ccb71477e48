//! Border-safe rectangle shaping.
//!
//! Cell content is blanked with rectangles that stop short of the horizontal
//! gridlines above and below it, and reach slightly past the glyph boxes on
//! the left and right. Vertical borders are the less critical ones to keep
//! pixel-exact.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::model::Rule;

/// Shaping magnitudes, as fractions of the page size unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingParams {
    /// Horizontal padding per side, fraction of page width
    pub pad_lr: f32,
    /// Vertical trim per side, fraction of page height
    pub trim_tb: f32,
    /// Height of the substitute band for degenerate results, fraction of page height
    pub min_height_frac: f32,
    /// Extra vertical margin around glyph boxes for ascenders and descenders, points
    pub ink_margin: f32,
}

impl Default for ShapingParams {
    fn default() -> Self {
        Self {
            pad_lr: 0.002,
            trim_tb: 0.003,
            min_height_frac: 0.004,
            ink_margin: 1.0,
        }
    }
}

/// Result of shaping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shaped {
    pub rect: Rect,
    /// The trimmed rectangle collapsed and a minimum band was substituted.
    pub degenerate: bool,
}

/// Trim top and bottom by `trim_tb * page_height` and pad left and right by
/// `pad_lr * page_width`.
///
/// When trimming would leave no positive height, a band of
/// `min_height` points centered on the original midpoint is returned instead
/// and the result is flagged degenerate. The output is clamped to the page.
pub fn shape(
    rect: Rect,
    page_width: f32,
    page_height: f32,
    pad_lr: f32,
    trim_tb: f32,
    min_height: f32,
) -> Shaped {
    let dx = pad_lr * page_width;
    let dy = trim_tb * page_height;
    let shaped = Rect::new(rect.x0 - dx, rect.y0 + dy, rect.x1 + dx, rect.y1 - dy);

    if shaped.height() > 0.0 && shaped.width() > 0.0 {
        return Shaped {
            rect: shaped.clamp_to(page_width, page_height),
            degenerate: false,
        };
    }

    let min_height = min_height.max(0.5);
    let width = shaped.width().max(min_height);
    let substitute = Rect::centered(
        (rect.x0 + rect.x1) / 2.0,
        (rect.y0 + rect.y1) / 2.0,
        width,
        min_height,
    );
    Shaped {
        rect: substitute.clamp_to(page_width, page_height),
        degenerate: true,
    }
}

/// Nearest gridlines above and below `content` that span its horizontal extent.
pub fn enclosing_rules(rules: &[Rule], content: &Rect) -> (Option<f32>, Option<f32>) {
    let mid = content.center_y();
    let spanning = rules.iter().filter(|r| r.spans(content.x0, content.x1));

    let mut above: Option<f32> = None;
    let mut below: Option<f32> = None;
    for rule in spanning {
        if rule.y <= mid {
            above = Some(above.map_or(rule.y, |a| a.max(rule.y)));
        } else {
            below = Some(below.map_or(rule.y, |b| b.min(rule.y)));
        }
    }
    (above, below)
}

/// Shaping bound to one page.
#[derive(Debug, Clone, Copy)]
pub struct Shaper {
    pub page_width: f32,
    pub page_height: f32,
    pub params: ShapingParams,
}

impl Shaper {
    pub fn new(page_width: f32, page_height: f32, params: ShapingParams) -> Self {
        Self {
            page_width,
            page_height,
            params,
        }
    }

    fn trim(&self) -> f32 {
        self.params.trim_tb * self.page_height
    }

    /// Shape a raw rectangle with no knowledge of the surrounding gridlines.
    pub fn shape(&self, rect: Rect) -> Shaped {
        shape(
            rect,
            self.page_width,
            self.page_height,
            self.params.pad_lr,
            self.params.trim_tb,
            self.params.min_height_frac * self.page_height,
        )
    }

    /// Shape the rectangle for text content sitting in a table cell.
    ///
    /// The content box is first grown by the ink margin plus the trim, so
    /// trimming gives the glyph boxes back, then clamped to the gridlines
    /// enclosing it. After trimming, the result lies strictly between those
    /// gridlines and covers every glyph that does not itself touch one.
    pub fn shape_cell(&self, content: Rect, rules: &[Rule]) -> Shaped {
        let grow = self.params.ink_margin + self.trim();
        let mut raw = content.expand(0.0, grow);

        let (above, below) = enclosing_rules(rules, &content);
        if let Some(y) = above {
            raw.y0 = raw.y0.max(y);
        }
        if let Some(y) = below {
            raw.y1 = raw.y1.min(y);
        }
        self.shape(raw)
    }
}
