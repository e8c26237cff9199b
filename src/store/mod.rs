// src/store/mod.rs

// Handlers and services only talk to the `Store` trait. `PgStore` backs
// deployments; `MemoryStore` serves local runs and the integration tests.

pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    attendance::{AttendanceLedger, AttendanceSettings, AttendanceStatus},
    course::Course,
    exam::Exam,
    leave::{LeaveRequest, LeaveStatus, NewLeaveRequest},
    result::{ExamResult, NewResult},
    session::{ExamSession, NewSession},
    user::UserProfile,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness guard rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The backend failed; nothing was written.
    #[error("backend: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Turns the answers saved on a session, read inside the finalizing write,
/// into the answers to keep and the result to insert.
pub type BuildSubmission<'a> =
    dyn Fn(&BTreeMap<i64, String>) -> (BTreeMap<i64, String>, NewResult) + Send + Sync + 'a;

#[async_trait]
pub trait Store: Send + Sync {
    // --- Directory ---
    async fn create_course(&self, name: &str, subjects: &[String]) -> StoreResult<Course>;
    async fn list_courses(&self) -> StoreResult<Vec<Course>>;
    async fn get_course(&self, id: i64) -> StoreResult<Option<Course>>;
    async fn delete_course(&self, id: i64) -> StoreResult<bool>;
    async fn upsert_user(&self, profile: &UserProfile) -> StoreResult<()>;
    async fn get_user(&self, id: i64) -> StoreResult<Option<UserProfile>>;

    // --- Exams ---
    /// Stores a new exam. The `id` of the argument is ignored.
    async fn create_exam(&self, exam: &Exam) -> StoreResult<Exam>;
    async fn update_exam(&self, exam: &Exam) -> StoreResult<bool>;
    async fn get_exam(&self, id: i64) -> StoreResult<Option<Exam>>;
    async fn list_exams(&self, course_id: Option<i64>) -> StoreResult<Vec<Exam>>;
    async fn delete_exam(&self, id: i64) -> StoreResult<bool>;

    // --- Attendance ---
    /// Returns the defaults when no settings were ever saved.
    async fn attendance_settings(&self) -> StoreResult<AttendanceSettings>;
    async fn save_attendance_settings(&self, settings: &AttendanceSettings) -> StoreResult<()>;
    async fn mark_attendance(
        &self,
        course_id: i64,
        date: NaiveDate,
        entries: &[(i64, AttendanceStatus)],
    ) -> StoreResult<()>;
    async fn course_ledger(&self, course_id: i64) -> StoreResult<AttendanceLedger>;

    // --- Leave requests ---
    async fn create_leave_request(&self, request: &NewLeaveRequest) -> StoreResult<LeaveRequest>;
    async fn get_leave_request(&self, id: i64) -> StoreResult<Option<LeaveRequest>>;
    /// Newest first. `None` filters match everything.
    async fn list_leave_requests(
        &self,
        course_id: Option<i64>,
        student_id: Option<i64>,
    ) -> StoreResult<Vec<LeaveRequest>>;
    /// Edits a request that is still pending. Returns false otherwise.
    async fn update_pending_leave_request(
        &self,
        id: i64,
        date: NaiveDate,
        reason: &str,
    ) -> StoreResult<bool>;
    /// Removes a request that is still pending. Returns false otherwise.
    async fn delete_pending_leave_request(&self, id: i64) -> StoreResult<bool>;
    /// Moves a pending request to `status`. Returns `None` when it was not pending.
    async fn decide_leave_request(
        &self,
        id: i64,
        status: LeaveStatus,
        decided_by: i64,
    ) -> StoreResult<Option<LeaveRequest>>;

    // --- Sessions ---
    /// Fails with `Conflict` if the student already has a running session for
    /// the exam, or when `single_attempt` is set and a result already exists.
    async fn create_session(&self, session: &NewSession) -> StoreResult<ExamSession>;
    async fn get_session(&self, id: i64) -> StoreResult<Option<ExamSession>>;
    async fn running_session(&self, exam_id: i64, student_id: i64)
    -> StoreResult<Option<ExamSession>>;
    /// Merges answers into a running session. Returns false if it is no longer running.
    async fn save_session_answers(
        &self,
        id: i64,
        answers: &BTreeMap<i64, String>,
    ) -> StoreResult<bool>;
    async fn expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<Vec<ExamSession>>;

    /// The single terminal transition of a session: flips it from running to
    /// submitted and inserts its result in one step. `build` sees the answers
    /// saved at that moment, so no concurrent draft is lost. Returns `None`
    /// when the session was not running anymore, in which case nothing is written.
    async fn finalize_session(
        &self,
        session_id: i64,
        build: &BuildSubmission<'_>,
    ) -> StoreResult<Option<ExamResult>>;

    // --- Results ---
    async fn get_result(&self, id: i64) -> StoreResult<Option<ExamResult>>;
    async fn results_for_exam(&self, exam_id: i64) -> StoreResult<Vec<ExamResult>>;
    async fn results_for_student(&self, student_id: i64) -> StoreResult<Vec<ExamResult>>;
    /// Overwrites answers and total of an existing result.
    async fn save_grades(&self, result: &ExamResult) -> StoreResult<bool>;
    /// Applies the publish gate to every result of the exam. Returns the number updated.
    async fn set_publish_state(
        &self,
        exam_id: i64,
        is_published: bool,
        publish_date: Option<DateTime<Utc>>,
    ) -> StoreResult<u64>;
    async fn delete_result(&self, id: i64) -> StoreResult<bool>;
}
