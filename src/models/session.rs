// src/models/session.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{models::exam::PublicQuestion, services::session::Phase};

/// Persisted status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Submitted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Submitted => "submitted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "submitted" => Some(SessionStatus::Submitted),
            _ => None,
        }
    }
}

/// Server-side record of one exam attempt.
/// The deadline is fixed at start; reloading the page does not reset it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,

    /// Draft answers saved so far, keyed by question id.
    pub answers: BTreeMap<i64, String>,

    pub status: SessionStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub result_id: Option<i64>,
}

impl ExamSession {
    /// Seconds left before forced submission, never negative.
    pub fn time_left_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.deadline - now).num_seconds().max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

/// Fields of a session before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub exam_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,

    /// Refuse the session if the student already holds a result for the exam.
    pub single_attempt: bool,
}

/// DTO for saving or submitting answers.
/// Key: question id. Value: answer text (option text for multiple-choice).
#[derive(Debug, Deserialize)]
pub struct AnswersRequest {
    pub answers: HashMap<i64, String>,
}

/// Session as returned to the student.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: i64,
    pub exam_id: i64,
    pub exam_name: String,
    pub status: SessionStatus,
    pub phase: Phase,
    pub time_left_secs: i64,
    pub deadline: DateTime<Utc>,
    pub questions: Vec<PublicQuestion>,
    pub answers: BTreeMap<i64, String>,
    pub result_id: Option<i64>,
}
