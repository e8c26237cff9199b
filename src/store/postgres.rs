// src/store/postgres.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use super::{BuildSubmission, Store, StoreError, StoreResult};
use crate::models::{
    attendance::{AttendanceLedger, AttendanceSettings, AttendanceStatus},
    course::Course,
    exam::{Exam, Question},
    leave::{LeaveRequest, LeaveStatus, NewLeaveRequest},
    result::{Answer, ExamResult},
    session::{ExamSession, NewSession, SessionStatus},
    user::{Role, UserProfile},
};

const ATTENDANCE_SETTINGS_KEY: &str = "attendance";

/// PostgreSQL backend. Nested documents (questions, answers, subjects) live in JSONB columns.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    tracing::error!("Database error: {:?}", err);
    StoreError::Backend(err.to_string())
}

/// Advisory lock key for one student's attempts at one exam. Session creation
/// and finalization both take it, so the single-attempt check and the result
/// insert cannot interleave.
fn attempt_lock_key(exam_id: i64, student_id: i64) -> i64 {
    exam_id.wrapping_shl(32) ^ student_id
}

async fn lock_attempts(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    exam_id: i64,
    student_id: i64,
) -> StoreResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(attempt_lock_key(exam_id, student_id))
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    Ok(())
}

fn corrupt(what: &str, value: &str) -> StoreError {
    StoreError::Backend(format!("unexpected {} '{}' in database", what, value))
}

// --- Row structs ---

#[derive(FromRow)]
struct CourseRow {
    id: i64,
    name: String,
    subjects: Json<Vec<String>>,
}

impl CourseRow {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            name: self.name,
            subjects: self.subjects.0,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    role: String,
    course_id: Option<i64>,
    assigned_courses: Json<Vec<i64>>,
}

impl UserRow {
    fn to_domain(self) -> StoreResult<UserProfile> {
        let role = Role::parse(&self.role).ok_or_else(|| corrupt("role", &self.role))?;
        Ok(UserProfile {
            id: self.id,
            name: self.name,
            role,
            course_id: self.course_id,
            assigned_courses: self.assigned_courses.0,
        })
    }
}

#[derive(FromRow)]
struct ExamRow {
    id: i64,
    name: String,
    description: String,
    course_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_minutes: i32,
    multiple_attempts: bool,
    questions: Json<Vec<Question>>,
}

impl ExamRow {
    fn to_domain(self) -> Exam {
        Exam {
            id: self.id,
            name: self.name,
            description: self.description,
            course_id: self.course_id,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes.max(0) as u32,
            multiple_attempts: self.multiple_attempts,
            questions: self.questions.0,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: i64,
    exam_id: i64,
    student_id: i64,
    course_id: i64,
    started_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    answers: Json<BTreeMap<i64, String>>,
    status: String,
    submitted_at: Option<DateTime<Utc>>,
    result_id: Option<i64>,
}

impl SessionRow {
    fn to_domain(self) -> StoreResult<ExamSession> {
        let status = SessionStatus::parse(&self.status)
            .ok_or_else(|| corrupt("session status", &self.status))?;
        Ok(ExamSession {
            id: self.id,
            exam_id: self.exam_id,
            student_id: self.student_id,
            course_id: self.course_id,
            started_at: self.started_at,
            deadline: self.deadline,
            answers: self.answers.0,
            status,
            submitted_at: self.submitted_at,
            result_id: self.result_id,
        })
    }
}

#[derive(FromRow)]
struct ResultRow {
    id: i64,
    session_id: i64,
    exam_id: i64,
    student_id: i64,
    course_id: i64,
    answers: Json<BTreeMap<i64, Answer>>,
    total_marks: i64,
    is_published: bool,
    publish_date: Option<DateTime<Utc>>,
    submitted_at: DateTime<Utc>,
}

impl ResultRow {
    fn to_domain(self) -> ExamResult {
        ExamResult {
            id: self.id,
            exam_id: self.exam_id,
            student_id: self.student_id,
            course_id: self.course_id,
            session_id: self.session_id,
            answers: self.answers.0,
            total_marks: u32::try_from(self.total_marks).unwrap_or(0),
            is_published: self.is_published,
            publish_date: self.publish_date,
            submitted_at: self.submitted_at,
        }
    }
}

#[derive(FromRow)]
struct LeaveRow {
    id: i64,
    student_id: i64,
    student_name: String,
    course_id: i64,
    day: NaiveDate,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
    decided_by: Option<i64>,
}

impl LeaveRow {
    fn to_domain(self) -> StoreResult<LeaveRequest> {
        let status =
            LeaveStatus::parse(&self.status).ok_or_else(|| corrupt("leave status", &self.status))?;
        Ok(LeaveRequest {
            id: self.id,
            student_id: self.student_id,
            student_name: self.student_name,
            course_id: self.course_id,
            date: self.day,
            reason: self.reason,
            status,
            created_at: self.created_at,
            decided_by: self.decided_by,
        })
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    day: NaiveDate,
    student_id: i64,
    status: String,
}

const EXAM_COLUMNS: &str = "id, name, description, course_id, start_time, end_time, \
     duration_minutes, multiple_attempts, questions";

const SESSION_COLUMNS: &str =
    "id, exam_id, student_id, course_id, started_at, deadline, answers, status, \
     submitted_at, result_id";

const LEAVE_COLUMNS: &str =
    "id, student_id, student_name, course_id, day, reason, status, created_at, decided_by";

const RESULT_COLUMNS: &str = "id, session_id, exam_id, student_id, course_id, answers, \
     total_marks, is_published, publish_date, submitted_at";

#[async_trait]
impl Store for PgStore {
    async fn create_course(&self, name: &str, subjects: &[String]) -> StoreResult<Course> {
        let row: CourseRow = sqlx::query_as(
            "INSERT INTO courses (name, subjects) VALUES ($1, $2) RETURNING id, name, subjects",
        )
        .bind(name)
        .bind(Json(subjects.to_vec()))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.to_domain())
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let rows: Vec<CourseRow> =
            sqlx::query_as("SELECT id, name, subjects FROM courses ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(CourseRow::to_domain).collect())
    }

    async fn get_course(&self, id: i64) -> StoreResult<Option<Course>> {
        let row: Option<CourseRow> =
            sqlx::query_as("SELECT id, name, subjects FROM courses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(CourseRow::to_domain))
    }

    async fn delete_course(&self, id: i64) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn upsert_user(&self, profile: &UserProfile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, role, course_id, assigned_courses)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                role = EXCLUDED.role,
                course_id = EXCLUDED.course_id,
                assigned_courses = EXCLUDED.assigned_courses
            "#,
        )
        .bind(profile.id)
        .bind(&profile.name)
        .bind(profile.role.as_str())
        .bind(profile.course_id)
        .bind(Json(profile.assigned_courses.clone()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<UserProfile>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, role, course_id, assigned_courses FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(UserRow::to_domain).transpose()
    }

    async fn create_exam(&self, exam: &Exam) -> StoreResult<Exam> {
        let row: ExamRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO exams
                (name, description, course_id, start_time, end_time,
                 duration_minutes, multiple_attempts, questions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            EXAM_COLUMNS
        ))
        .bind(&exam.name)
        .bind(&exam.description)
        .bind(exam.course_id)
        .bind(exam.start_time)
        .bind(exam.end_time)
        .bind(exam.duration_minutes as i32)
        .bind(exam.multiple_attempts)
        .bind(Json(exam.questions.clone()))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.to_domain())
    }

    async fn update_exam(&self, exam: &Exam) -> StoreResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE exams SET
                name = $2, description = $3, course_id = $4, start_time = $5,
                end_time = $6, duration_minutes = $7, multiple_attempts = $8, questions = $9
            WHERE id = $1
            "#,
        )
        .bind(exam.id)
        .bind(&exam.name)
        .bind(&exam.description)
        .bind(exam.course_id)
        .bind(exam.start_time)
        .bind(exam.end_time)
        .bind(exam.duration_minutes as i32)
        .bind(exam.multiple_attempts)
        .bind(Json(exam.questions.clone()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn get_exam(&self, id: i64) -> StoreResult<Option<Exam>> {
        let row: Option<ExamRow> =
            sqlx::query_as(&format!("SELECT {} FROM exams WHERE id = $1", EXAM_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(ExamRow::to_domain))
    }

    async fn list_exams(&self, course_id: Option<i64>) -> StoreResult<Vec<Exam>> {
        let rows: Vec<ExamRow> = sqlx::query_as(&format!(
            "SELECT {} FROM exams WHERE $1::BIGINT IS NULL OR course_id = $1 ORDER BY start_time",
            EXAM_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ExamRow::to_domain).collect())
    }

    async fn delete_exam(&self, id: i64) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn attendance_settings(&self) -> StoreResult<AttendanceSettings> {
        let value: Option<Json<AttendanceSettings>> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
                .bind(ATTENDANCE_SETTINGS_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(value.map(|v| v.0).unwrap_or_default())
    }

    async fn save_attendance_settings(&self, settings: &AttendanceSettings) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(ATTENDANCE_SETTINGS_KEY)
        .bind(Json(*settings))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn mark_attendance(
        &self,
        course_id: i64,
        date: NaiveDate,
        entries: &[(i64, AttendanceStatus)],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (student_id, status) in entries {
            sqlx::query(
                r#"
                INSERT INTO attendance (course_id, day, student_id, status)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (course_id, day, student_id) DO UPDATE SET status = EXCLUDED.status
                "#,
            )
            .bind(course_id)
            .bind(date)
            .bind(*student_id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn course_ledger(&self, course_id: i64) -> StoreResult<AttendanceLedger> {
        let rows: Vec<AttendanceRow> =
            sqlx::query_as("SELECT day, student_id, status FROM attendance WHERE course_id = $1")
                .bind(course_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        let mut ledger = AttendanceLedger::new();
        for row in rows {
            let status = AttendanceStatus::parse(&row.status)
                .ok_or_else(|| corrupt("attendance status", &row.status))?;
            ledger
                .entry(row.day)
                .or_default()
                .insert(row.student_id, status);
        }
        Ok(ledger)
    }

    async fn create_leave_request(&self, request: &NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let row: LeaveRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO leave_requests (student_id, student_name, course_id, day, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            LEAVE_COLUMNS
        ))
        .bind(request.student_id)
        .bind(&request.student_name)
        .bind(request.course_id)
        .bind(request.date)
        .bind(&request.reason)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row.to_domain()
    }

    async fn get_leave_request(&self, id: i64) -> StoreResult<Option<LeaveRequest>> {
        let row: Option<LeaveRow> = sqlx::query_as(&format!(
            "SELECT {} FROM leave_requests WHERE id = $1",
            LEAVE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(LeaveRow::to_domain).transpose()
    }

    async fn list_leave_requests(
        &self,
        course_id: Option<i64>,
        student_id: Option<i64>,
    ) -> StoreResult<Vec<LeaveRequest>> {
        let rows: Vec<LeaveRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM leave_requests
            WHERE ($1::BIGINT IS NULL OR course_id = $1)
              AND ($2::BIGINT IS NULL OR student_id = $2)
            ORDER BY id DESC
            "#,
            LEAVE_COLUMNS
        ))
        .bind(course_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(LeaveRow::to_domain).collect()
    }

    async fn update_pending_leave_request(
        &self,
        id: i64,
        date: NaiveDate,
        reason: &str,
    ) -> StoreResult<bool> {
        let done = sqlx::query(
            "UPDATE leave_requests SET day = $2, reason = $3 WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(date)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_pending_leave_request(&self, id: i64) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM leave_requests WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn decide_leave_request(
        &self,
        id: i64,
        status: LeaveStatus,
        decided_by: i64,
    ) -> StoreResult<Option<LeaveRequest>> {
        let row: Option<LeaveRow> = sqlx::query_as(&format!(
            r#"
            UPDATE leave_requests SET status = $2, decided_by = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            LEAVE_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(decided_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(LeaveRow::to_domain).transpose()
    }

    async fn create_session(&self, session: &NewSession) -> StoreResult<ExamSession> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        lock_attempts(&mut tx, session.exam_id, session.student_id).await?;

        if session.single_attempt {
            let attempted: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM results WHERE exam_id = $1 AND student_id = $2)",
            )
            .bind(session.exam_id)
            .bind(session.student_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
            if attempted {
                tx.rollback().await.map_err(db_err)?;
                return Err(StoreError::Conflict(
                    "You have already attempted this exam".to_string(),
                ));
            }
        }

        let row: SessionRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO exam_sessions (exam_id, student_id, course_id, started_at, deadline)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(session.exam_id)
        .bind(session.student_id)
        .bind(session.course_id)
        .bind(session.started_at)
        .bind(session.deadline)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        row.to_domain()
    }

    async fn get_session(&self, id: i64) -> StoreResult<Option<ExamSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM exam_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(SessionRow::to_domain).transpose()
    }

    async fn running_session(
        &self,
        exam_id: i64,
        student_id: i64,
    ) -> StoreResult<Option<ExamSession>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM exam_sessions \
             WHERE exam_id = $1 AND student_id = $2 AND status = 'running'",
            SESSION_COLUMNS
        ))
        .bind(exam_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(SessionRow::to_domain).transpose()
    }

    async fn save_session_answers(
        &self,
        id: i64,
        answers: &BTreeMap<i64, String>,
    ) -> StoreResult<bool> {
        // `||` on JSONB objects merges keys, newer values win.
        let done = sqlx::query(
            "UPDATE exam_sessions SET answers = answers || $2 WHERE id = $1 AND status = 'running'",
        )
        .bind(id)
        .bind(Json(answers.clone()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<Vec<ExamSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM exam_sessions WHERE status = 'running' AND deadline <= $1",
            SESSION_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(SessionRow::to_domain).collect()
    }

    async fn finalize_session(
        &self,
        session_id: i64,
        build: &BuildSubmission<'_>,
    ) -> StoreResult<Option<ExamResult>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let owner: Option<(i64, i64)> =
            sqlx::query_as("SELECT exam_id, student_id FROM exam_sessions WHERE id = $1")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let Some((exam_id, student_id)) = owner else {
            tx.rollback().await.map_err(db_err)?;
            return Ok(None);
        };
        lock_attempts(&mut tx, exam_id, student_id).await?;

        // The row lock serializes racing submissions with each other and with
        // draft saves; the loser re-reads the status and finds nothing.
        let saved: Option<Json<BTreeMap<i64, String>>> = sqlx::query_scalar(
            "SELECT answers FROM exam_sessions WHERE id = $1 AND status = 'running' FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let Some(Json(saved)) = saved else {
            tx.rollback().await.map_err(db_err)?;
            return Ok(None);
        };

        let (answers, result) = build(&saved);

        sqlx::query(
            r#"
            UPDATE exam_sessions
            SET status = 'submitted', answers = $2, submitted_at = $3
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(Json(answers))
        .bind(result.submitted_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let row: ResultRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO results
                (session_id, exam_id, student_id, course_id, answers, total_marks, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            RESULT_COLUMNS
        ))
        .bind(session_id)
        .bind(result.exam_id)
        .bind(result.student_id)
        .bind(result.course_id)
        .bind(Json(result.answers))
        .bind(i64::from(result.total_marks))
        .bind(result.submitted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE exam_sessions SET result_id = $1 WHERE id = $2")
            .bind(row.id)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(Some(row.to_domain()))
    }

    async fn get_result(&self, id: i64) -> StoreResult<Option<ExamResult>> {
        let row: Option<ResultRow> =
            sqlx::query_as(&format!("SELECT {} FROM results WHERE id = $1", RESULT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(ResultRow::to_domain))
    }

    async fn results_for_exam(&self, exam_id: i64) -> StoreResult<Vec<ExamResult>> {
        let rows: Vec<ResultRow> = sqlx::query_as(&format!(
            "SELECT {} FROM results WHERE exam_id = $1 ORDER BY id",
            RESULT_COLUMNS
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ResultRow::to_domain).collect())
    }

    async fn results_for_student(&self, student_id: i64) -> StoreResult<Vec<ExamResult>> {
        let rows: Vec<ResultRow> = sqlx::query_as(&format!(
            "SELECT {} FROM results WHERE student_id = $1 ORDER BY id",
            RESULT_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ResultRow::to_domain).collect())
    }

    async fn save_grades(&self, result: &ExamResult) -> StoreResult<bool> {
        let done = sqlx::query("UPDATE results SET answers = $2, total_marks = $3 WHERE id = $1")
            .bind(result.id)
            .bind(Json(result.answers.clone()))
            .bind(i64::from(result.total_marks))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }

    async fn set_publish_state(
        &self,
        exam_id: i64,
        is_published: bool,
        publish_date: Option<DateTime<Utc>>,
    ) -> StoreResult<u64> {
        let done = sqlx::query(
            "UPDATE results SET is_published = $2, publish_date = $3 WHERE exam_id = $1",
        )
        .bind(exam_id)
        .bind(is_published)
        .bind(publish_date)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(done.rows_affected())
    }

    async fn delete_result(&self, id: i64) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM results WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() > 0)
    }
}
