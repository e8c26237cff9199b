// src/models/leave.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LeaveStatus::Pending),
            "approved" => Some(LeaveStatus::Approved),
            "rejected" => Some(LeaveStatus::Rejected),
            _ => None,
        }
    }
}

/// A student's request to be excused for one day of their course.
/// Approval records the day as absent in the attendance ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub course_id: i64,
    pub date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub created_at: DateTime<Utc>,

    /// Staff member who approved or rejected it.
    pub decided_by: Option<i64>,
}

/// Fields of a leave request before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub student_id: i64,
    pub student_name: String,
    pub course_id: i64,
    pub date: NaiveDate,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// DTO for filing or editing a leave request.
#[derive(Debug, Deserialize, Validate)]
pub struct LeaveRequestInput {
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 1000, message = "Please provide a reason."))]
    pub reason: String,
}

/// Query string for the staff listing.
#[derive(Debug, Default, Deserialize)]
pub struct LeaveListQuery {
    pub course_id: Option<i64>,
    pub status: Option<LeaveStatus>,
}
