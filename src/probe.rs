//! Layout probe: text and band queries over one page's extracted words.
//!
//! All queries are pure and answer "nothing found" with an empty result.
//! Matching runs against visual lines joined back into text, so a literal
//! split across adjacent tokens (common with OCR) is still found.

use regex::Regex;

use crate::geometry::Rect;
use crate::lines::{group_into_lines, JoinedLine};
use crate::model::{PageLayout, Word};

/// What to search for.
#[derive(Debug, Clone, Copy)]
pub enum Needle<'n> {
    /// Plain substring.
    Literal(&'n str),
    /// Regular expression; the whole match is located.
    Pattern(&'n Regex),
    /// Anchor label: the literal must stand on its own, so "성명" does not
    /// match inside "담임성명" and "1." does not match inside "2023.1.".
    Label(&'n str),
}

/// A located match.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Matched text
    pub text: String,
    /// Box of the matched characters, page points
    pub bbox: Rect,
    /// Number of words the match spans
    pub words: usize,
}

/// Queries over a page's words.
pub struct LayoutProbe<'a> {
    page: &'a PageLayout,
    lines: Vec<JoinedLine<'a>>,
}

impl<'a> LayoutProbe<'a> {
    /// Build a probe, grouping words into visual lines with `line_tolerance`.
    pub fn new(page: &'a PageLayout, line_tolerance: f32) -> Self {
        let lines = group_into_lines(&page.words, line_tolerance)
            .iter()
            .map(|line| JoinedLine::new(line))
            .collect();
        Self { page, lines }
    }

    pub fn page(&self) -> &'a PageLayout {
        self.page
    }

    /// Number of visual text lines on the page.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Joined text of every visual line, top to bottom.
    pub fn line_texts(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.text.as_str())
    }

    /// Every match of `needle`, topmost first, then leftmost.
    pub fn find_all(&self, needle: Needle<'_>) -> Vec<Match> {
        let mut matches = match needle {
            Needle::Literal(lit) => {
                if lit.is_empty() {
                    return Vec::new();
                }
                self.collect(|text| {
                    text.match_indices(lit)
                        .map(|(start, m)| (start, start + m.len()))
                        .collect()
                })
            }
            Needle::Pattern(re) => {
                self.collect(|text| re.find_iter(text).map(|m| (m.start(), m.end())).collect())
            }
            Needle::Label(label) => match label_regex(label) {
                Some(re) => self.collect(|text| {
                    re.captures_iter(text)
                        .filter_map(|c| c.get(1))
                        .map(|m| (m.start(), m.end()))
                        .collect()
                }),
                None => return Vec::new(),
            },
        };

        matches.sort_by(|a, b| Rect::reading_order(&a.bbox, &b.bbox));
        matches
    }

    /// Topmost-then-leftmost match of `needle`.
    pub fn find_first(&self, needle: Needle<'_>) -> Option<Rect> {
        self.find_all(needle).into_iter().next().map(|m| m.bbox)
    }

    /// Words whose vertical extent intersects `[y0, y1]` and, when given,
    /// whose horizontal extent intersects `[x0, x1]`.
    pub fn words_in_band(&self, y0: f32, y1: f32, x0: Option<f32>, x1: Option<f32>) -> Vec<&'a Word> {
        self.page
            .words
            .iter()
            .filter(|w| w.bbox.y1 >= y0 && w.bbox.y0 <= y1)
            .filter(|w| x0.map_or(true, |x0| w.bbox.x1 >= x0))
            .filter(|w| x1.map_or(true, |x1| w.bbox.x0 <= x1))
            .collect()
    }

    fn collect<F>(&self, mut find: F) -> Vec<Match>
    where
        F: FnMut(&str) -> Vec<(usize, usize)>,
    {
        let mut out = Vec::new();
        for line in &self.lines {
            for (start, end) in find(&line.text) {
                if start >= end {
                    continue;
                }
                if let Some(bbox) = line.locate(start, end) {
                    out.push(Match {
                        text: line.text[start..end].to_string(),
                        bbox,
                        words: line.word_count(start, end),
                    });
                }
            }
        }
        out
    }
}

/// Regex locating `label` as a standalone token.
///
/// The label is captured as group 1. It must be preceded by the start of the
/// line, whitespace or an opening bracket, and followed by the end of the
/// line, whitespace, a colon or a closing bracket.
///
/// Labels ending in punctuation are section numbers ("1.", "2.") and look
/// exactly like the parts of a spaced date ("2022. 2. 5."). They match only
/// as the first token of a visual line, followed by a space and a title that
/// does not start with a digit.
fn label_regex(label: &str) -> Option<Regex> {
    if label.is_empty() {
        return None;
    }
    let section_number = label
        .chars()
        .last()
        .is_some_and(|c| !c.is_alphanumeric());
    let pattern = if section_number {
        format!(r"^({})\s+[^\d\s]", regex::escape(label))
    } else {
        format!(
            r"(?:^|[\s(（\[<])({})(?:$|[\s:：)）\]>·])",
            regex::escape(label)
        )
    };
    Regex::new(&pattern).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f32, y0: f32, x1: f32) -> Word {
        Word::new(text, Rect::new(x0, y0, x1, y0 + 10.0))
    }

    fn page(words: Vec<Word>) -> PageLayout {
        PageLayout::a4(0).with_words(words)
    }

    #[test]
    fn test_find_first_topmost_then_leftmost() {
        let p = page(vec![
            word("성명", 300.0, 100.0, 320.0),
            word("성명", 50.0, 100.0, 70.0),
            word("성명", 10.0, 200.0, 30.0),
        ]);
        let probe = LayoutProbe::new(&p, 2.5);
        let first = probe.find_first(Needle::Literal("성명")).unwrap();
        assert_eq!(first.x0, 50.0);
        assert_eq!(probe.find_all(Needle::Literal("성명")).len(), 3);
    }

    #[test]
    fn test_label_skips_compound_words() {
        let p = page(vec![
            word("담임성명", 300.0, 50.0, 340.0),
            word("성명:", 50.0, 100.0, 75.0),
            word("박지호", 80.0, 100.0, 110.0),
        ]);
        let probe = LayoutProbe::new(&p, 2.5);
        let matches = probe.find_all(Needle::Label("성명"));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "성명");
        assert!(matches[0].bbox.x0 >= 50.0 && matches[0].bbox.x1 <= 75.0);
    }

    #[test]
    fn test_label_section_number() {
        let p = page(vec![
            word("2023.1.", 50.0, 100.0, 90.0),
            word("1.", 20.0, 300.0, 30.0),
            word("인적·학적사항", 35.0, 300.0, 100.0),
        ]);
        let probe = LayoutProbe::new(&p, 2.5);
        let rect = probe.find_first(Needle::Label("1.")).unwrap();
        assert_eq!(rect.y0, 300.0);
    }

    #[test]
    fn test_section_number_ignores_spaced_dates() {
        let p = page(vec![
            word("2022.", 80.0, 100.0, 105.0),
            word("2.", 110.0, 100.0, 120.0),
            word("5.", 125.0, 100.0, 135.0),
            word("졸업", 140.0, 100.0, 160.0),
            word("2.", 80.0, 120.0, 90.0),
            word("5.", 95.0, 120.0, 105.0),
            word("전학", 110.0, 120.0, 130.0),
            word("2.", 20.0, 300.0, 30.0),
            word("출결상황", 35.0, 300.0, 75.0),
        ]);
        let probe = LayoutProbe::new(&p, 2.5);
        let matches = probe.find_all(Needle::Label("2."));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bbox.y0, 300.0);
        assert_eq!(matches[0].text, "2.");
    }

    #[test]
    fn test_pattern_across_split_tokens() {
        let p = page(vec![
            word("대성고등", 100.0, 400.0, 140.0),
            word("학교", 141.0, 400.0, 161.0),
        ]);
        let probe = LayoutProbe::new(&p, 2.5);
        let re = Regex::new(r"\S+고등학교").unwrap();
        let matches = probe.find_all(Needle::Pattern(&re));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "대성고등학교");
        assert_eq!(matches[0].words, 2);
        assert_eq!(matches[0].bbox.x1, 161.0);
    }

    #[test]
    fn test_words_in_band_intersects() {
        let p = page(vec![
            word("a", 10.0, 95.0, 20.0),
            word("b", 200.0, 100.0, 220.0),
            word("c", 10.0, 150.0, 20.0),
        ]);
        let probe = LayoutProbe::new(&p, 2.5);
        assert_eq!(probe.words_in_band(100.0, 110.0, None, None).len(), 2);
        assert_eq!(probe.words_in_band(100.0, 110.0, Some(15.0), Some(100.0)).len(), 1);
        assert!(probe.words_in_band(500.0, 600.0, None, None).is_empty());
    }

    #[test]
    fn test_absent_is_empty() {
        let p = page(Vec::new());
        let probe = LayoutProbe::new(&p, 2.5);
        assert!(probe.find_first(Needle::Label("학적사항")).is_none());
        assert!(probe.find_all(Needle::Literal("")).is_empty());
        assert_eq!(probe.line_count(), 0);
    }
}
