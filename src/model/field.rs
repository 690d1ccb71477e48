//! Redaction targets.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// A named semantic region to redact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    /// Student ID photo (page 1)
    Photo,
    /// 반 column of the class/teacher table
    ClassColumn,
    /// 번호 column
    NumberColumn,
    /// 담임성명 column
    TeacherColumn,
    /// 성명 / 성별 / 주민등록번호 line
    StudentInfoLine,
    /// 주소 line
    AddressLine,
    /// 학적사항 block
    AcademicHistoryBlock,
    /// 특기사항 block
    SpecialNotesBlock,
    /// School (and optionally university) names anywhere on the page
    SchoolNameMention,
    /// Per-page footer with school/class/name
    FooterIdentityBlock,
    /// Thin print header strip at the top of every page
    HeaderStrip,
}

impl TargetField {
    /// Fields resolved only on the first page.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TargetField::Photo
                | TargetField::ClassColumn
                | TargetField::NumberColumn
                | TargetField::TeacherColumn
                | TargetField::StudentInfoLine
                | TargetField::AddressLine
                | TargetField::AcademicHistoryBlock
                | TargetField::SpecialNotesBlock
        )
    }

    /// Short identifier used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetField::Photo => "photo",
            TargetField::ClassColumn => "class_column",
            TargetField::NumberColumn => "number_column",
            TargetField::TeacherColumn => "teacher_column",
            TargetField::StudentInfoLine => "student_info_line",
            TargetField::AddressLine => "address_line",
            TargetField::AcademicHistoryBlock => "academic_history_block",
            TargetField::SpecialNotesBlock => "special_notes_block",
            TargetField::SchoolNameMention => "school_name_mention",
            TargetField::FooterIdentityBlock => "footer_identity_block",
            TargetField::HeaderStrip => "header_strip",
        }
    }
}

impl std::fmt::Display for TargetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RGB fill color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Opaque white, the only fill used for transcripts.
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// A rectangle queued for permanent blanking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactionRect {
    /// Area to blank, page points
    pub bbox: Rect,
    /// Fill painted over the area
    pub fill: Color,
    /// Field this rectangle was resolved for
    pub field: TargetField,
}

impl RedactionRect {
    /// White-filled rectangle for `field`.
    pub fn new(field: TargetField, bbox: Rect) -> Self {
        Self {
            bbox,
            fill: Color::WHITE,
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_fields() {
        assert!(TargetField::Photo.is_structural());
        assert!(TargetField::SpecialNotesBlock.is_structural());
        assert!(!TargetField::FooterIdentityBlock.is_structural());
        assert!(!TargetField::SchoolNameMention.is_structural());
    }

    #[test]
    fn test_redaction_rect_is_white() {
        let r = RedactionRect::new(TargetField::Photo, Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(r.fill, Color::WHITE);
    }

    #[test]
    fn test_field_serde_name() {
        let json = serde_json::to_string(&TargetField::AddressLine).unwrap();
        assert_eq!(json, "\"address_line\"");
        assert_eq!(TargetField::AddressLine.to_string(), "address_line");
    }
}
