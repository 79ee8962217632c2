//! Core record types for rollcall.
//!
//! Field names on the wire and in the CSV tables follow the historical
//! column headers (`Roll No`, `Name`, `Dept`, `Year`, `Section`, `Timestamp`).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Header row of the students table.
pub const STUDENT_HEADERS: [&str; 5] = ["Roll No", "Name", "Dept", "Year", "Section"];

/// Header row of the attendance table.
pub const ATTENDANCE_HEADERS: [&str; 6] =
    ["Roll No", "Name", "Dept", "Year", "Section", "Timestamp"];

/// Format of attendance timestamps (local clock).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A registered student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Generated identifier, `<roll>_<5 alphanumerics>`.
    #[serde(rename = "Roll No")]
    pub roll_no: String,
    /// Student name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Department.
    #[serde(rename = "Dept")]
    pub dept: String,
    /// Year of study.
    #[serde(rename = "Year")]
    pub year: String,
    /// Section.
    #[serde(rename = "Section")]
    pub section: String,
}

/// One marked attendance, denormalized from the student at mark time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Identifier of the student.
    #[serde(rename = "Roll No")]
    pub roll_no: String,
    /// Student name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Department.
    #[serde(rename = "Dept")]
    pub dept: String,
    /// Year of study.
    #[serde(rename = "Year")]
    pub year: String,
    /// Section.
    #[serde(rename = "Section")]
    pub section: String,
    /// When attendance was marked, formatted with [`TIMESTAMP_FORMAT`].
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

impl AttendanceRecord {
    /// Build a record for `student` marked at `at`.
    #[must_use]
    pub fn for_student(student: &Student, at: NaiveDateTime) -> Self {
        Self {
            roll_no: student.roll_no.clone(),
            name: student.name.clone(),
            dept: student.dept.clone(),
            year: student.year.clone(),
            section: student.section.clone(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}
