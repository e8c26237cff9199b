// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::{BuildSubmission, Store, StoreError, StoreResult};
use crate::models::{
    attendance::{AttendanceLedger, AttendanceSettings, AttendanceStatus},
    course::Course,
    exam::Exam,
    leave::{LeaveRequest, LeaveStatus, NewLeaveRequest},
    result::ExamResult,
    session::{ExamSession, NewSession, SessionStatus},
    user::UserProfile,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    courses: BTreeMap<i64, Course>,
    users: HashMap<i64, UserProfile>,
    exams: BTreeMap<i64, Exam>,
    attendance: HashMap<i64, AttendanceLedger>,
    settings: Option<AttendanceSettings>,
    leave_requests: BTreeMap<i64, LeaveRequest>,
    sessions: BTreeMap<i64, ExamSession>,
    results: BTreeMap<i64, ExamResult>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store. Every operation holds the lock for its whole duration,
/// so each call is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_course(&self, name: &str, subjects: &[String]) -> StoreResult<Course> {
        let mut inner = self.inner.write().await;
        let course = Course {
            id: inner.next_id(),
            name: name.to_string(),
            subjects: subjects.to_vec(),
        };
        inner.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        Ok(self.inner.read().await.courses.values().cloned().collect())
    }

    async fn get_course(&self, id: i64) -> StoreResult<Option<Course>> {
        Ok(self.inner.read().await.courses.get(&id).cloned())
    }

    async fn delete_course(&self, id: i64) -> StoreResult<bool> {
        Ok(self.inner.write().await.courses.remove(&id).is_some())
    }

    async fn upsert_user(&self, profile: &UserProfile) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .users
            .insert(profile.id, profile.clone());
        Ok(())
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<UserProfile>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create_exam(&self, exam: &Exam) -> StoreResult<Exam> {
        let mut inner = self.inner.write().await;
        let mut stored = exam.clone();
        stored.id = inner.next_id();
        inner.exams.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_exam(&self, exam: &Exam) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.exams.get_mut(&exam.id) {
            Some(slot) => {
                *slot = exam.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_exam(&self, id: i64) -> StoreResult<Option<Exam>> {
        Ok(self.inner.read().await.exams.get(&id).cloned())
    }

    async fn list_exams(&self, course_id: Option<i64>) -> StoreResult<Vec<Exam>> {
        Ok(self
            .inner
            .read()
            .await
            .exams
            .values()
            .filter(|e| course_id.is_none_or(|c| e.course_id == c))
            .cloned()
            .collect())
    }

    async fn delete_exam(&self, id: i64) -> StoreResult<bool> {
        Ok(self.inner.write().await.exams.remove(&id).is_some())
    }

    async fn attendance_settings(&self) -> StoreResult<AttendanceSettings> {
        Ok(self.inner.read().await.settings.unwrap_or_default())
    }

    async fn save_attendance_settings(&self, settings: &AttendanceSettings) -> StoreResult<()> {
        self.inner.write().await.settings = Some(*settings);
        Ok(())
    }

    async fn mark_attendance(
        &self,
        course_id: i64,
        date: NaiveDate,
        entries: &[(i64, AttendanceStatus)],
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let day = inner
            .attendance
            .entry(course_id)
            .or_default()
            .entry(date)
            .or_default();
        for (student_id, status) in entries {
            day.insert(*student_id, *status);
        }
        Ok(())
    }

    async fn course_ledger(&self, course_id: i64) -> StoreResult<AttendanceLedger> {
        Ok(self
            .inner
            .read()
            .await
            .attendance
            .get(&course_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_leave_request(&self, request: &NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let mut inner = self.inner.write().await;
        let stored = LeaveRequest {
            id: inner.next_id(),
            student_id: request.student_id,
            student_name: request.student_name.clone(),
            course_id: request.course_id,
            date: request.date,
            reason: request.reason.clone(),
            status: LeaveStatus::Pending,
            created_at: request.created_at,
            decided_by: None,
        };
        inner.leave_requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_leave_request(&self, id: i64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.inner.read().await.leave_requests.get(&id).cloned())
    }

    async fn list_leave_requests(
        &self,
        course_id: Option<i64>,
        student_id: Option<i64>,
    ) -> StoreResult<Vec<LeaveRequest>> {
        Ok(self
            .inner
            .read()
            .await
            .leave_requests
            .values()
            .rev()
            .filter(|r| course_id.is_none_or(|c| r.course_id == c))
            .filter(|r| student_id.is_none_or(|s| r.student_id == s))
            .cloned()
            .collect())
    }

    async fn update_pending_leave_request(
        &self,
        id: i64,
        date: NaiveDate,
        reason: &str,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.leave_requests.get_mut(&id) {
            Some(r) if r.status == LeaveStatus::Pending => {
                r.date = date;
                r.reason = reason.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_pending_leave_request(&self, id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let pending = matches!(
            inner.leave_requests.get(&id),
            Some(r) if r.status == LeaveStatus::Pending
        );
        if pending {
            inner.leave_requests.remove(&id);
        }
        Ok(pending)
    }

    async fn decide_leave_request(
        &self,
        id: i64,
        status: LeaveStatus,
        decided_by: i64,
    ) -> StoreResult<Option<LeaveRequest>> {
        let mut inner = self.inner.write().await;
        match inner.leave_requests.get_mut(&id) {
            Some(r) if r.status == LeaveStatus::Pending => {
                r.status = status;
                r.decided_by = Some(decided_by);
                Ok(Some(r.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn create_session(&self, session: &NewSession) -> StoreResult<ExamSession> {
        let mut inner = self.inner.write().await;
        let already_running = inner.sessions.values().any(|s| {
            s.exam_id == session.exam_id
                && s.student_id == session.student_id
                && s.status == SessionStatus::Running
        });
        if already_running {
            return Err(StoreError::Conflict(
                "A session for this exam is already running".to_string(),
            ));
        }
        let attempted = session.single_attempt
            && inner.results.values().any(|r| {
                r.exam_id == session.exam_id && r.student_id == session.student_id
            });
        if attempted {
            return Err(StoreError::Conflict(
                "You have already attempted this exam".to_string(),
            ));
        }

        let stored = ExamSession {
            id: inner.next_id(),
            exam_id: session.exam_id,
            student_id: session.student_id,
            course_id: session.course_id,
            started_at: session.started_at,
            deadline: session.deadline,
            answers: BTreeMap::new(),
            status: SessionStatus::Running,
            submitted_at: None,
            result_id: None,
        };
        inner.sessions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_session(&self, id: i64) -> StoreResult<Option<ExamSession>> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn running_session(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> StoreResult<Option<ExamSession>> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .values()
            .find(|s| {
                s.exam_id == exam_id
                    && s.student_id == student_id
                    && s.status == SessionStatus::Running
            })
            .cloned())
    }

    async fn save_session_answers(
        &self,
        id: i64,
        answers: &BTreeMap<i64, String>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(&id) {
            Some(s) if s.status == SessionStatus::Running => {
                s.answers
                    .extend(answers.iter().map(|(k, v)| (*k, v.clone())));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<Vec<ExamSession>> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Running && s.is_expired(now))
            .cloned()
            .collect())
    }

    async fn finalize_session(
        &self,
        session_id: i64,
        build: &BuildSubmission<'_>,
    ) -> StoreResult<Option<ExamResult>> {
        let mut inner = self.inner.write().await;
        let (answers, result) = match inner.sessions.get(&session_id) {
            Some(s) if s.status == SessionStatus::Running => build(&s.answers),
            _ => return Ok(None),
        };

        let submitted_at = result.submitted_at;
        let stored = result.into_result(inner.next_id(), session_id);
        inner.results.insert(stored.id, stored.clone());

        if let Some(session) = inner.sessions.get_mut(&session_id) {
            session.status = SessionStatus::Submitted;
            session.answers = answers;
            session.submitted_at = Some(submitted_at);
            session.result_id = Some(stored.id);
        }
        Ok(Some(stored))
    }

    async fn get_result(&self, id: i64) -> StoreResult<Option<ExamResult>> {
        Ok(self.inner.read().await.results.get(&id).cloned())
    }

    async fn results_for_exam(&self, exam_id: i64) -> StoreResult<Vec<ExamResult>> {
        Ok(self
            .inner
            .read()
            .await
            .results
            .values()
            .filter(|r| r.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn results_for_student(&self, student_id: i64) -> StoreResult<Vec<ExamResult>> {
        Ok(self
            .inner
            .read()
            .await
            .results
            .values()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn save_grades(&self, result: &ExamResult) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.results.get_mut(&result.id) {
            Some(stored) => {
                stored.answers = result.answers.clone();
                stored.total_marks = result.total_marks;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_publish_state(
        &self,
        exam_id: i64,
        is_published: bool,
        publish_date: Option<DateTime<Utc>>,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let mut updated = 0;
        for r in inner.results.values_mut().filter(|r| r.exam_id == exam_id) {
            r.is_published = is_published;
            r.publish_date = publish_date;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_result(&self, id: i64) -> StoreResult<bool> {
        Ok(self.inner.write().await.results.remove(&id).is_some())
    }
}
