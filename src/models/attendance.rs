// src/models/attendance.rs

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::HalfDay => "half-day",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "half-day" => Some(AttendanceStatus::HalfDay),
            _ => None,
        }
    }
}

/// Per-course attendance: date -> student id -> status.
/// A missing entry means the day was not marked for that student.
pub type AttendanceLedger = BTreeMap<NaiveDate, HashMap<i64, AttendanceStatus>>;

/// Global attendance policy. All values are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct AttendanceSettings {
    #[validate(range(min = 0.0, max = 100.0, message = "Must be between 0 and 100."))]
    pub absent_penalty: f64,
    #[validate(range(min = 0.0, max = 100.0, message = "Must be between 0 and 100."))]
    pub half_day_penalty: f64,
    #[validate(range(min = 0.0, max = 100.0, message = "Must be between 0 and 100."))]
    pub exam_eligibility_threshold: f64,
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            absent_penalty: 5.0,
            half_day_penalty: 2.5,
            exam_eligibility_threshold: 80.0,
        }
    }
}

/// DTO for marking one course day. Re-marking overwrites listed students only.
#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub entries: HashMap<i64, AttendanceStatus>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub present: u32,
    pub absent: u32,
    pub half_day: u32,
}

impl DayCounts {
    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::HalfDay => self.half_day += 1,
        }
    }

    pub fn marked(&self) -> u32 {
        self.present + self.absent + self.half_day
    }
}

/// Attendance overview returned to a student.
#[derive(Debug, Serialize)]
pub struct AttendanceSummary {
    pub student_id: i64,
    pub course_id: Option<i64>,
    pub total_percentage: f64,
    pub monthly_percentage: f64,
    pub overall: DayCounts,
    pub this_month: DayCounts,
    /// Keyed `YYYY-MM`, chronological.
    pub by_month: BTreeMap<String, DayCounts>,
    pub eligible: bool,
    pub threshold: f64,
}
