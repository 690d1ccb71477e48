//! Visual line grouping.
//!
//! Table cells hold multi-word content (dates, names, numbers) that must be
//! blanked as one block without bleeding into the neighbouring cell. Words
//! are grouped into visual lines first, then each line is clipped to a known
//! column window.

use crate::geometry::Rect;
use crate::model::Word;

/// Default vertical tolerance between word tops on the same line, in points.
pub const DEFAULT_LINE_TOLERANCE: f32 = 2.5;

/// A gap wider than this fraction of the word height is read as a space
/// when joining a line into text.
const JOIN_GAP_RATIO: f32 = 0.25;

/// Cluster words into visual lines.
///
/// A word joins the current line when the difference between its top and
/// the top of the line's first word is within `tolerance`. Lines come back
/// top to bottom and words left to right, although callers should not rely
/// on that ordering for correctness.
pub fn group_into_lines<'a, I>(words: I, tolerance: f32) -> Vec<Vec<&'a Word>>
where
    I: IntoIterator<Item = &'a Word>,
{
    let mut sorted: Vec<&Word> = words.into_iter().collect();
    sorted.sort_by(|a, b| Rect::reading_order(&a.bbox, &b.bbox));

    let mut lines: Vec<Vec<&Word>> = Vec::new();
    let mut current: Vec<&Word> = Vec::new();
    let mut current_top: Option<f32> = None;

    for word in sorted {
        match current_top {
            Some(top) if (word.bbox.y0 - top).abs() <= tolerance => current.push(word),
            _ => {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current_top = Some(word.bbox.y0);
                current.push(word);
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    }
    lines
}

/// Minimal rectangle enclosing a line, optionally clipped to `[x_min, x_max]`.
///
/// Returns `None` for an empty line or when the clip leaves nothing.
pub fn bounding_rect(line: &[&Word], x_min: Option<f32>, x_max: Option<f32>) -> Option<Rect> {
    let mut iter = line.iter();
    let first = iter.next()?;
    let mut rect = iter.fold(first.bbox, |acc, w| acc.union(&w.bbox));

    if let Some(x_min) = x_min {
        rect.x0 = rect.x0.max(x_min);
    }
    if let Some(x_max) = x_max {
        rect.x1 = rect.x1.min(x_max);
    }

    (rect.x1 > rect.x0).then_some(rect)
}

/// A visual line flattened into text, remembering which bytes came from
/// which word.
#[derive(Debug, Clone)]
pub struct JoinedLine<'a> {
    pub text: String,
    spans: Vec<(usize, usize, &'a Word)>,
}

impl<'a> JoinedLine<'a> {
    /// Join a line's words.
    ///
    /// Adjacent words whose horizontal gap is small relative to their height
    /// are concatenated without a separator, which rebuilds tokens that OCR
    /// split mid-word (e.g. "고등" + "학교").
    pub fn new(line: &[&'a Word]) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(line.len());
        let mut prev: Option<&Word> = None;

        for word in line {
            if let Some(p) = prev {
                let gap = word.bbox.x0 - p.bbox.x1;
                let height = p.bbox.height().max(word.bbox.height()).max(1.0);
                if gap > height * JOIN_GAP_RATIO {
                    text.push(' ');
                }
            }
            let start = text.len();
            text.push_str(&word.text);
            spans.push((start, text.len(), *word));
            prev = Some(word);
        }

        Self { text, spans }
    }

    /// Number of words the byte range `[start, end)` touches.
    pub fn word_count(&self, start: usize, end: usize) -> usize {
        self.spans
            .iter()
            .filter(|(s, e, _)| *s < end && *e > start)
            .count()
    }

    /// Page box covering the byte range `[start, end)` of `text`.
    pub fn locate(&self, start: usize, end: usize) -> Option<Rect> {
        let mut result: Option<Rect> = None;
        for (s, e, word) in &self.spans {
            if *s >= end || *e <= start {
                continue;
            }
            let from = start.max(*s) - s;
            let to = end.min(*e) - s;
            let char_from = word.text[..from].chars().count();
            let char_to = word.text[..to].chars().count();
            let part = word.sub_rect(char_from, char_to);
            result = Some(match result {
                Some(r) => r.union(&part),
                None => part,
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> Word {
        Word::new(text, Rect::new(x0, y0, x1, y1))
    }

    #[test]
    fn test_group_into_lines_tolerance() {
        let words = vec![
            word("b", 50.0, 101.5, 60.0, 111.0),
            word("a", 10.0, 100.0, 20.0, 110.0),
            word("c", 10.0, 130.0, 20.0, 140.0),
        ];
        let lines = group_into_lines(&words, DEFAULT_LINE_TOLERANCE);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 2);
        assert_eq!(lines[0][0].text, "a");
        assert_eq!(lines[1][0].text, "c");
    }

    #[test]
    fn test_group_outside_tolerance_splits() {
        let words = vec![
            word("a", 10.0, 100.0, 20.0, 110.0),
            word("b", 30.0, 103.0, 40.0, 113.0),
        ];
        assert_eq!(group_into_lines(&words, 2.5).len(), 2);
    }

    #[test]
    fn test_bounding_rect_clip() {
        let words = vec![
            word("2023", 10.0, 100.0, 40.0, 110.0),
            word("03", 45.0, 101.0, 60.0, 111.0),
        ];
        let line: Vec<&Word> = words.iter().collect();
        assert_eq!(
            bounding_rect(&line, None, None),
            Some(Rect::new(10.0, 100.0, 60.0, 111.0))
        );
        assert_eq!(
            bounding_rect(&line, Some(20.0), Some(50.0)),
            Some(Rect::new(20.0, 100.0, 50.0, 111.0))
        );
        assert_eq!(bounding_rect(&line, Some(70.0), None), None);
        assert_eq!(bounding_rect(&[], None, None), None);
    }

    #[test]
    fn test_joined_line_rebuilds_split_token() {
        let words = vec![
            word("대성고등", 10.0, 0.0, 50.0, 10.0),
            word("학교", 51.0, 0.0, 71.0, 10.0),
            word("졸업", 90.0, 0.0, 110.0, 10.0),
        ];
        let line: Vec<&Word> = words.iter().collect();
        let joined = JoinedLine::new(&line);
        assert_eq!(joined.text, "대성고등학교 졸업");

        let start = joined.text.find("고등학교").unwrap();
        let end = start + "고등학교".len();
        assert_eq!(joined.word_count(start, end), 2);
        let rect = joined.locate(start, end).unwrap();
        assert!((rect.x0 - 30.0).abs() < 1e-3);
        assert!((rect.x1 - 71.0).abs() < 1e-3);
    }
}
