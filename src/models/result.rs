// src/models/result.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grading state of one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerStatus {
    AutoGraded,
    PendingEvaluation,
    Evaluated,
}

/// One submitted answer with the marks it earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub marks: u32,
    pub status: AnswerStatus,
}

/// Outcome of one exam attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub course_id: i64,

    /// The session that produced this result.
    pub session_id: i64,

    /// Keyed by question id.
    pub answers: BTreeMap<i64, Answer>,

    /// Always the sum of `answers[*].marks`.
    pub total_marks: u32,

    pub is_published: bool,
    pub publish_date: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
}

impl ExamResult {
    /// Whether any answer still waits for a grader.
    pub fn has_pending(&self) -> bool {
        self.answers
            .values()
            .any(|a| a.status == AnswerStatus::PendingEvaluation)
    }
}

/// Result fields known at submission time; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewResult {
    pub exam_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub answers: BTreeMap<i64, Answer>,
    pub total_marks: u32,
    pub submitted_at: DateTime<Utc>,
}

impl NewResult {
    pub fn into_result(self, id: i64, session_id: i64) -> ExamResult {
        ExamResult {
            id,
            exam_id: self.exam_id,
            student_id: self.student_id,
            course_id: self.course_id,
            session_id,
            answers: self.answers,
            total_marks: self.total_marks,
            is_published: false,
            publish_date: None,
            submitted_at: self.submitted_at,
        }
    }
}

/// DTO for saving grader marks.
/// Key: question id. Value: requested marks (clamped to the question's range).
#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub marks: HashMap<i64, i64>,
}

/// DTO for the publish gate of one exam.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub is_published: bool,
    pub publish_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub exam_id: i64,
    pub is_published: bool,
    pub publish_date: Option<DateTime<Utc>>,
    pub updated: u64,
}

/// Result row in the staff listing, joined with the student's name.
#[derive(Debug, Serialize)]
pub struct StaffResultView {
    pub student_name: String,
    pub pending_evaluation: bool,
    #[serde(flatten)]
    pub result: ExamResult,
}

/// What a student sees once a result is visible.
#[derive(Debug, Serialize)]
pub struct StudentResultView {
    pub id: i64,
    pub exam_id: i64,
    pub exam_name: String,
    pub total_marks: u32,
    pub max_marks: u32,
    pub answers: BTreeMap<i64, Answer>,
    pub submitted_at: DateTime<Utc>,
}
