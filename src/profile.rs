//! Template calibration profiles.
//!
//! Each revision of the transcript template moves things by a few points.
//! Everything that depends on the revision lives in a [`TemplateProfile`],
//! so a new revision is a new JSON file rather than a code change.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::FracRect;
use crate::lines::DEFAULT_LINE_TOLERANCE;
use crate::shaping::ShapingParams;

/// Anchor label texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorLabels {
    pub grade: String,
    pub department: String,
    pub class: String,
    pub number: String,
    pub teacher: String,
    pub name: String,
    pub gender: String,
    pub resident_number: String,
    pub address: String,
    pub academic_history: String,
    pub special_notes: String,
    /// Title of the personal/academic section ("1. 인적·학적사항")
    pub section_one: String,
    /// Title of the following section
    pub section_two: String,
}

impl Default for AnchorLabels {
    fn default() -> Self {
        Self {
            grade: "학년".to_string(),
            department: "학과".to_string(),
            class: "반".to_string(),
            number: "번호".to_string(),
            teacher: "담임성명".to_string(),
            name: "성명".to_string(),
            gender: "성별".to_string(),
            resident_number: "주민등록번호".to_string(),
            address: "주소".to_string(),
            academic_history: "학적사항".to_string(),
            special_notes: "특기사항".to_string(),
            section_one: "1.".to_string(),
            section_two: "2.".to_string(),
        }
    }
}

/// Proportional fallback rectangles, used when anchors are missing.
///
/// `None` disables the fallback; the field is then skipped with a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackRegions {
    pub photo: Option<FracRect>,
    /// Class/number/teacher cells of the first table
    pub class_table: Option<FracRect>,
    pub student_info: Option<FracRect>,
    pub address: Option<FracRect>,
    pub academic_history: Option<FracRect>,
    pub special_notes: Option<FracRect>,
}

impl Default for FallbackRegions {
    fn default() -> Self {
        Self {
            photo: Some(FracRect::new(0.028, 0.038, 0.208, 0.162)),
            class_table: Some(FracRect::new(0.52, 0.052, 0.985, 0.150)),
            student_info: Some(FracRect::new(0.125, 0.162, 0.985, 0.193)),
            address: Some(FracRect::new(0.090, 0.198, 0.985, 0.228)),
            academic_history: Some(FracRect::new(0.125, 0.232, 0.985, 0.268)),
            special_notes: Some(FracRect::new(0.125, 0.274, 0.985, 0.335)),
        }
    }
}

/// Calibration constants for one template revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateProfile {
    /// Profile name, echoed in reports
    pub name: String,
    /// Vertical tolerance for line grouping, points
    pub line_tolerance: f32,
    pub shaping: ShapingParams,
    /// Slack around anchor boxes when deriving bands, points
    pub anchor_epsilon: f32,
    /// Inset from column boundaries, points
    pub column_margin: f32,
    /// Extra horizontal margin for the numeral widening pass, points
    pub numeral_pad: f32,
    /// Words matching this are re-covered by the widening pass
    pub numeral_pattern: String,
    /// Right edge of the table area, fraction of page width
    pub table_right_frac: f32,
    /// Photo candidates must start above this fraction of page height
    pub photo_region_frac: f32,
    /// Margin added around the chosen photo image, points
    pub photo_margin: f32,
    /// Title region of page 1 excluded from school-name matching, fraction of height
    pub title_region_frac: f32,
    /// Top of the footer band, fraction of page height
    pub footer_top_frac: f32,
    /// Margin kept around the page-number tokens, points
    pub footer_keep_margin: f32,
    /// Thin strip blanked at the top of every page
    pub header_strip: Option<FracRect>,
    /// Pages with fewer visual text lines are treated as scanned
    pub min_text_lines: usize,
    /// School-name patterns
    pub school_patterns: Vec<String>,
    /// University-name pattern, applied when `redact_universities` is set
    pub university_pattern: String,
    pub redact_universities: bool,
    /// Known full names matched literally
    pub school_names: Vec<String>,
    pub anchors: AnchorLabels,
    pub fallbacks: FallbackRegions,
}

impl Default for TemplateProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            line_tolerance: DEFAULT_LINE_TOLERANCE,
            shaping: ShapingParams::default(),
            anchor_epsilon: 2.0,
            column_margin: 1.5,
            numeral_pad: 3.0,
            numeral_pattern: r"\d{2,4}".to_string(),
            table_right_frac: 0.985,
            photo_region_frac: 0.40,
            photo_margin: 1.0,
            title_region_frac: 0.10,
            footer_top_frac: 0.935,
            footer_keep_margin: 6.0,
            header_strip: Some(FracRect::new(0.0, 0.0, 1.0, 0.015)),
            min_text_lines: 10,
            school_patterns: vec![r"\S+고등학교".to_string()],
            university_pattern: r"\S*대학교\S*".to_string(),
            redact_universities: false,
            school_names: Vec::new(),
            anchors: AnchorLabels::default(),
            fallbacks: FallbackRegions::default(),
        }
    }
}

impl TemplateProfile {
    /// Parse and validate a profile from JSON. Missing keys take default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let profile: TemplateProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Check value ranges and compile every pattern once.
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("table_right_frac", self.table_right_frac),
            ("photo_region_frac", self.photo_region_frac),
            ("title_region_frac", self.title_region_frac),
            ("footer_top_frac", self.footer_top_frac),
            ("shaping.pad_lr", self.shaping.pad_lr),
            ("shaping.trim_tb", self.shaping.trim_tb),
            ("shaping.min_height_frac", self.shaping.min_height_frac),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Profile(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }
        if self.line_tolerance < 0.0 {
            return Err(Error::Profile("line_tolerance must not be negative".to_string()));
        }

        let regions = [
            ("header_strip", self.header_strip),
            ("fallbacks.photo", self.fallbacks.photo),
            ("fallbacks.class_table", self.fallbacks.class_table),
            ("fallbacks.student_info", self.fallbacks.student_info),
            ("fallbacks.address", self.fallbacks.address),
            ("fallbacks.academic_history", self.fallbacks.academic_history),
            ("fallbacks.special_notes", self.fallbacks.special_notes),
        ];
        for (name, region) in regions {
            if let Some(r) = region {
                if !r.is_valid() {
                    return Err(Error::Profile(format!("{} is not a valid page fraction box", name)));
                }
            }
        }

        self.school_regexes()?;
        compile(&self.numeral_pattern)?;
        Ok(())
    }

    /// Compiled school-name patterns, including the university pattern when enabled.
    pub fn school_regexes(&self) -> Result<Vec<Regex>> {
        let mut patterns: Vec<&str> = self.school_patterns.iter().map(String::as_str).collect();
        if self.redact_universities {
            patterns.push(&self.university_pattern);
        }
        patterns.into_iter().map(compile).collect()
    }

    pub fn numeral_regex(&self) -> Result<Regex> {
        compile(&self.numeral_pattern)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Profile(format!("invalid pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_valid() {
        let profile = TemplateProfile::default();
        assert!(profile.validate().is_ok());
        assert_eq!(profile.school_regexes().unwrap().len(), 1);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let profile = TemplateProfile::from_json(
            r#"{"name": "2024", "redact_universities": true, "footer_top_frac": 0.94}"#,
        )
        .unwrap();
        assert_eq!(profile.name, "2024");
        assert_eq!(profile.footer_top_frac, 0.94);
        assert_eq!(profile.line_tolerance, DEFAULT_LINE_TOLERANCE);
        assert_eq!(profile.school_regexes().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let err = TemplateProfile::from_json(r#"{"footer_top_frac": 1.5}"#).unwrap_err();
        assert!(matches!(err, Error::Profile(_)));

        let err = TemplateProfile::from_json(r#"{"school_patterns": ["("]}"#).unwrap_err();
        assert!(matches!(err, Error::Profile(_)));

        let err = TemplateProfile::from_json(
            r#"{"fallbacks": {"photo": {"x0": 0.5, "y0": 0.0, "x1": 0.4, "y1": 0.1}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Profile(_)));
    }

    #[test]
    fn test_disabled_fallback() {
        let profile = TemplateProfile::from_json(r#"{"fallbacks": {"photo": null}}"#).unwrap();
        assert!(profile.fallbacks.photo.is_none());
        assert!(profile.fallbacks.address.is_some());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let mut profile = TemplateProfile::default();
        profile.school_names.push("대성고등학교".to_string());
        profile.save(&path).unwrap();

        let loaded = TemplateProfile::from_path(&path).unwrap();
        assert_eq!(loaded, profile);
    }
}
