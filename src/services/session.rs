// src/services/session.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        exam::{Exam, PublicQuestion},
        result::{ExamResult, NewResult},
        session::{ExamSession, NewSession, SessionStatus, SessionView},
    },
    services::{
        access::{Viewer, exam_not_found},
        eligibility, scoring,
    },
    store::{Store, StoreError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    /// The student pressed submit.
    Manual,
    /// The deadline passed and the sweeper submitted the saved answers.
    Timeout,
}

/// Lifecycle of one persisted attempt.
///
/// `Running -> Submitting -> Submitted | Error`. The exam lookup and start
/// checks in [`start`] come before a session exists. `Error` keeps the attempt
/// retryable: it may enter `Submitting` again.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Running { deadline: DateTime<Utc> },
    Submitting { trigger: SubmitTrigger },
    Submitted { result_id: Option<i64> },
    Error { message: String },
}

impl Phase {
    /// Phase of a persisted session.
    pub fn from_session(session: &ExamSession) -> Self {
        match session.status {
            SessionStatus::Running => Phase::Running {
                deadline: session.deadline,
            },
            SessionStatus::Submitted => Phase::Submitted {
                result_id: session.result_id,
            },
        }
    }

    /// Returns `Timeout` once a running attempt has reached its deadline.
    pub fn tick(&self, now: DateTime<Utc>) -> Option<SubmitTrigger> {
        match self {
            Phase::Running { deadline } if now >= *deadline => Some(SubmitTrigger::Timeout),
            _ => None,
        }
    }

    pub fn begin_submit(&mut self, trigger: SubmitTrigger) -> Result<(), AppError> {
        match &*self {
            Phase::Running { .. } | Phase::Error { .. } => {}
            Phase::Submitting { .. } => {
                return Err(AppError::Conflict(
                    "Submission already in progress".to_string(),
                ));
            }
            Phase::Submitted { .. } => return Err(already_submitted()),
        }
        *self = Phase::Submitting { trigger };
        Ok(())
    }

    pub fn finish(&mut self, outcome: Result<i64, String>) -> Result<(), AppError> {
        if !matches!(self, Phase::Submitting { .. }) {
            return Err(invalid_transition(self, "finish"));
        }
        *self = match outcome {
            Ok(result_id) => Phase::Submitted {
                result_id: Some(result_id),
            },
            Err(message) => Phase::Error { message },
        };
        Ok(())
    }
}

fn invalid_transition(from: &Phase, to: &str) -> AppError {
    AppError::Conflict(format!("Cannot {} an exam session in state {:?}", to, from))
}

fn already_submitted() -> AppError {
    AppError::Conflict("Exam already submitted".to_string())
}

fn session_not_found() -> AppError {
    AppError::NotFound("Session not found".to_string())
}

/// Session as shown to its student. Answer keys are never included.
pub fn view(session: &ExamSession, exam: Option<&Exam>, now: DateTime<Utc>) -> SessionView {
    SessionView {
        session_id: session.id,
        exam_id: session.exam_id,
        exam_name: exam.map(|e| e.name.clone()).unwrap_or_default(),
        status: session.status,
        phase: Phase::from_session(session),
        time_left_secs: match session.status {
            SessionStatus::Running => session.time_left_secs(now),
            SessionStatus::Submitted => 0,
        },
        deadline: session.deadline,
        questions: exam
            .map(|e| e.questions.iter().map(PublicQuestion::from).collect())
            .unwrap_or_default(),
        answers: session.answers.clone(),
        result_id: session.result_id,
    }
}

/// Loads a session owned by the caller.
pub async fn load_owned(
    store: &dyn Store,
    viewer: &Viewer,
    session_id: i64,
) -> Result<ExamSession, AppError> {
    match store.get_session(session_id).await? {
        Some(session) if session.student_id == viewer.user_id => Ok(session),
        _ => Err(session_not_found()),
    }
}

/// Starts an attempt, or resumes the student's running one.
///
/// A running session that already passed its deadline is force-submitted
/// first; the usual start checks then decide whether a new attempt is allowed.
pub async fn start(
    store: &dyn Store,
    viewer: &Viewer,
    exam_id: i64,
    now: DateTime<Utc>,
) -> Result<(ExamSession, Exam), AppError> {
    let exam = store
        .get_exam(exam_id)
        .await?
        .filter(|e| viewer.can_access_course(e.course_id))
        .ok_or_else(exam_not_found)?;

    if let Some(running) = store.running_session(exam.id, viewer.user_id).await? {
        if !running.is_expired(now) {
            tracing::info!(
                "Resuming session {} for student {} on exam {}",
                running.id,
                viewer.user_id,
                exam.id
            );
            return Ok((running, exam));
        }
        force_submit(store, &running, now).await?;
    }

    if !exam.is_active_at(now) {
        return Err(AppError::Conflict("Exam is not active".to_string()));
    }

    let gate = eligibility::check(store, &viewer.student_profile(), now.date_naive()).await?;
    if let Some(message) = gate.message() {
        return Err(AppError::Forbidden(message));
    }

    let deadline = now + Duration::seconds(exam.duration_secs());
    let new_session = NewSession {
        exam_id: exam.id,
        student_id: viewer.user_id,
        course_id: exam.course_id,
        started_at: now,
        deadline,
        single_attempt: !exam.multiple_attempts,
    };

    match store.create_session(&new_session).await {
        Ok(session) => {
            tracing::info!(
                "Started session {} for student {} on exam {} (deadline {})",
                session.id,
                viewer.user_id,
                exam.id,
                deadline
            );
            Ok((session, exam))
        }
        // Either a concurrent start won the race (hand back its session) or
        // the exam was already attempted.
        Err(StoreError::Conflict(msg)) => {
            match store.running_session(exam.id, viewer.user_id).await? {
                Some(session) => Ok((session, exam)),
                None => Err(AppError::Conflict(msg)),
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Merges draft answers into a running session.
pub async fn save_answers(
    store: &dyn Store,
    viewer: &Viewer,
    session_id: i64,
    answers: HashMap<i64, String>,
    now: DateTime<Utc>,
) -> Result<ExamSession, AppError> {
    let mut session = load_owned(store, viewer, session_id).await?;
    if session.status == SessionStatus::Submitted {
        return Err(already_submitted());
    }
    if session.is_expired(now) {
        return Err(AppError::Conflict("Time is up".to_string()));
    }

    let exam = store
        .get_exam(session.exam_id)
        .await?
        .ok_or_else(exam_not_found)?;
    reject_unknown_questions(&exam, &answers)?;

    let draft: BTreeMap<i64, String> = answers.into_iter().collect();
    if !store.save_session_answers(session.id, &draft).await? {
        return Err(already_submitted());
    }

    session.answers.extend(draft);
    Ok(session)
}

/// Manual submission.
///
/// Request answers are merged over the saved drafts and every question must
/// end up with a non-empty answer. Accepted until `grace_secs` after the
/// deadline; later than that the sweeper owns the attempt.
pub async fn submit(
    store: &dyn Store,
    viewer: &Viewer,
    session_id: i64,
    answers: HashMap<i64, String>,
    grace_secs: i64,
    now: DateTime<Utc>,
) -> Result<ExamResult, AppError> {
    let session = load_owned(store, viewer, session_id).await?;
    if session.status == SessionStatus::Submitted {
        return Err(already_submitted());
    }
    if now > session.deadline + Duration::seconds(grace_secs) {
        return Err(AppError::Conflict(
            "Time is up; your saved answers are submitted automatically".to_string(),
        ));
    }

    let exam = store
        .get_exam(session.exam_id)
        .await?
        .ok_or_else(exam_not_found)?;
    reject_unknown_questions(&exam, &answers)?;

    let mut merged = session.answers.clone();
    merged.extend(answers.clone());

    let missing: Vec<String> = exam
        .questions
        .iter()
        .filter(|q| merged.get(&q.id).is_none_or(|a| a.trim().is_empty()))
        .map(|q| q.id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Please answer every question before submitting. Unanswered: {}",
            missing.join(", ")
        )));
    }

    let overrides: BTreeMap<i64, String> = answers.into_iter().collect();
    finalize(store, &session, Some(&exam), &overrides, SubmitTrigger::Manual, now)
        .await?
        .ok_or_else(already_submitted)
}

/// Forced submission of the saved answers after the deadline.
///
/// The answers are read when the session is finalized, so a draft saved after
/// `session` was loaded is still included. Returns `None` when the session was
/// submitted by someone else first.
pub async fn force_submit(
    store: &dyn Store,
    session: &ExamSession,
    now: DateTime<Utc>,
) -> Result<Option<ExamResult>, AppError> {
    // The exam may have been deleted meanwhile; the attempt is still closed.
    let exam = store.get_exam(session.exam_id).await?;
    finalize(
        store,
        session,
        exam.as_ref(),
        &BTreeMap::new(),
        SubmitTrigger::Timeout,
        now,
    )
    .await
}

/// Scores the saved answers with `overrides` merged on top and performs the
/// terminal transition.
async fn finalize(
    store: &dyn Store,
    session: &ExamSession,
    exam: Option<&Exam>,
    overrides: &BTreeMap<i64, String>,
    trigger: SubmitTrigger,
    now: DateTime<Utc>,
) -> Result<Option<ExamResult>, AppError> {
    let mut phase = Phase::from_session(session);
    phase.begin_submit(trigger)?;

    let questions = exam.map(|e| e.questions.as_slice()).unwrap_or(&[]);
    let build = |saved: &BTreeMap<i64, String>| {
        let mut answers = saved.clone();
        answers.extend(overrides.iter().map(|(k, v)| (*k, v.clone())));
        let (scored, total_marks) = scoring::score(questions, &answers);
        let result = NewResult {
            exam_id: session.exam_id,
            student_id: session.student_id,
            course_id: session.course_id,
            answers: scored,
            total_marks,
            submitted_at: now,
        };
        (answers, result)
    };

    match store.finalize_session(session.id, &build).await {
        Ok(Some(result)) => {
            phase.finish(Ok(result.id))?;
            tracing::info!(
                "Session {} submitted ({:?}): result {} with {} marks",
                session.id,
                trigger,
                result.id,
                result.total_marks
            );
            Ok(Some(result))
        }
        Ok(None) => Ok(None),
        Err(e) => {
            phase.finish(Err(e.to_string()))?;
            tracing::warn!("Submitting session {} failed: {}", session.id, e);
            Err(e.into())
        }
    }
}

fn reject_unknown_questions(exam: &Exam, answers: &HashMap<i64, String>) -> Result<(), AppError> {
    let mut unknown: Vec<i64> = answers
        .keys()
        .filter(|id| exam.question(**id).is_none())
        .copied()
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    Err(AppError::BadRequest(format!(
        "Unknown question ids: {:?}",
        unknown
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        attendance::AttendanceStatus,
        exam::{Question, QuestionKind},
        result::AnswerStatus,
        user::{Role, UserProfile},
    };
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 15, 10, 0, 0).unwrap()
    }

    fn student(id: i64) -> Viewer {
        Viewer {
            user_id: id,
            role: Role::Student,
            profile: Some(UserProfile {
                id,
                name: format!("student {}", id),
                role: Role::Student,
                course_id: Some(1),
                assigned_courses: Vec::new(),
            }),
        }
    }

    fn exam(multiple_attempts: bool) -> Exam {
        Exam {
            id: 0,
            name: "Midterm".to_string(),
            description: String::new(),
            course_id: 1,
            start_time: now() - Duration::hours(1),
            end_time: now() + Duration::hours(1),
            duration_minutes: 1,
            multiple_attempts,
            questions: vec![
                Question {
                    id: 1,
                    text: "Pick B".to_string(),
                    marks: 5,
                    kind: QuestionKind::MultipleChoice {
                        options: vec!["A".into(), "B".into()],
                        correct_answer: "B".to_string(),
                    },
                },
                Question {
                    id: 2,
                    text: "Explain".to_string(),
                    marks: 10,
                    kind: QuestionKind::ShortAnswer,
                },
            ],
        }
    }

    async fn setup(multiple_attempts: bool) -> (MemoryStore, Exam) {
        let store = MemoryStore::new();
        let exam = store.create_exam(&exam(multiple_attempts)).await.unwrap();
        (store, exam)
    }

    fn answers(pairs: &[(i64, &str)]) -> HashMap<i64, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_phase_happy_path() {
        let deadline = now() + Duration::seconds(60);
        let mut phase = Phase::Running { deadline };
        assert_eq!(phase.tick(now()), None);
        assert_eq!(phase.tick(deadline), Some(SubmitTrigger::Timeout));

        phase.begin_submit(SubmitTrigger::Timeout).unwrap();
        phase.finish(Ok(7)).unwrap();
        assert_eq!(phase, Phase::Submitted { result_id: Some(7) });
    }

    #[test]
    fn test_phase_error_allows_retry() {
        let mut phase = Phase::Running { deadline: now() };
        phase.begin_submit(SubmitTrigger::Manual).unwrap();
        assert!(matches!(
            phase.begin_submit(SubmitTrigger::Timeout),
            Err(AppError::Conflict(_))
        ));

        phase.finish(Err("store down".to_string())).unwrap();
        assert!(matches!(phase, Phase::Error { .. }));
        phase.begin_submit(SubmitTrigger::Manual).unwrap();
    }

    #[test]
    fn test_phase_rejects_out_of_order_transitions() {
        assert!(
            Phase::Submitted { result_id: Some(1) }
                .begin_submit(SubmitTrigger::Timeout)
                .is_err()
        );
        assert!(Phase::Running { deadline: now() }.finish(Ok(1)).is_err());
    }

    #[tokio::test]
    async fn test_start_sets_deadline_and_resumes() {
        let (store, exam) = setup(false).await;
        let viewer = student(10);

        let (first, _) = start(&store, &viewer, exam.id, now()).await.unwrap();
        assert_eq!(first.deadline, now() + Duration::seconds(60));
        assert_eq!(first.time_left_secs(now()), 60);

        let later = now() + Duration::seconds(20);
        let (again, _) = start(&store, &viewer, exam.id, later).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.time_left_secs(later), 40);
    }

    #[tokio::test]
    async fn test_start_hides_other_course_exam() {
        let (store, exam) = setup(false).await;
        let mut viewer = student(10);
        if let Some(p) = viewer.profile.as_mut() {
            p.course_id = Some(2);
        }

        let err = start(&store, &viewer, exam.id, now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = start(&store, &student(10), 999, now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_start_outside_window_conflicts() {
        let (store, exam) = setup(false).await;
        let err = start(&store, &student(10), exam.id, now() + Duration::hours(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_start_refused_when_ineligible() {
        let (store, exam) = setup(false).await;
        for d in 1..=5 {
            let day = chrono::NaiveDate::from_ymd_opt(2026, 5, d).unwrap();
            store
                .mark_attendance(1, day, &[(10, AttendanceStatus::Absent)])
                .await
                .unwrap();
        }

        let err = start(&store, &student(10), exam.id, now()).await.unwrap_err();
        match err {
            AppError::Forbidden(msg) => assert!(msg.contains("below the required 80%")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_manual_submit_requires_every_answer() {
        let (store, exam) = setup(false).await;
        let viewer = student(10);
        let (session, _) = start(&store, &viewer, exam.id, now()).await.unwrap();

        let err = submit(&store, &viewer, session.id, answers(&[(1, "B"), (2, "  ")]), 5, now())
            .await
            .unwrap_err();
        match err {
            AppError::BadRequest(msg) => assert!(msg.contains("Unanswered: 2")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(store.results_for_student(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_submit_merges_drafts_and_is_single_shot() {
        let (store, exam) = setup(false).await;
        let viewer = student(10);
        let (session, _) = start(&store, &viewer, exam.id, now()).await.unwrap();

        save_answers(&store, &viewer, session.id, answers(&[(2, "essay")]), now())
            .await
            .unwrap();
        let result = submit(&store, &viewer, session.id, answers(&[(1, "B")]), 5, now())
            .await
            .unwrap();

        assert_eq!(result.total_marks, 5);
        assert_eq!(result.answers[&2].answer, "essay");
        assert_eq!(result.answers[&2].status, AnswerStatus::PendingEvaluation);
        assert!(!result.is_published);

        let err = submit(&store, &viewer, session.id, answers(&[(1, "B")]), 5, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = start(&store, &viewer, exam.id, now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.results_for_student(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_then_manual_submit_creates_one_result() {
        let (store, exam) = setup(false).await;
        let viewer = student(10);
        let (session, _) = start(&store, &viewer, exam.id, now()).await.unwrap();
        save_answers(&store, &viewer, session.id, answers(&[(1, "B")]), now())
            .await
            .unwrap();

        let at_deadline = session.deadline;
        let saved = store.get_session(session.id).await.unwrap().unwrap();
        let forced = force_submit(&store, &saved, at_deadline).await.unwrap().unwrap();
        assert_eq!(forced.total_marks, 5);
        assert_eq!(forced.answers[&1].status, AnswerStatus::AutoGraded);

        assert!(force_submit(&store, &saved, at_deadline).await.unwrap().is_none());
        let err = submit(
            &store,
            &viewer,
            session.id,
            answers(&[(1, "B"), (2, "late")]),
            5,
            at_deadline,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.results_for_student(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forced_submit_keeps_draft_saved_after_snapshot() {
        let (store, exam) = setup(false).await;
        let viewer = student(10);
        let (session, _) = start(&store, &viewer, exam.id, now()).await.unwrap();

        // The sweeper lists the session, then the student saves one more draft.
        let stale = store.get_session(session.id).await.unwrap().unwrap();
        let just_before = session.deadline - Duration::seconds(1);
        save_answers(&store, &viewer, session.id, answers(&[(1, "B")]), just_before)
            .await
            .unwrap();

        let forced = force_submit(&store, &stale, session.deadline)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forced.answers[&1].answer, "B");
        assert_eq!(forced.total_marks, 5);

        let closed = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(closed.answers[&1], "B");
    }

    #[tokio::test]
    async fn test_store_refuses_second_attempt_of_single_attempt_exam() {
        let (store, exam) = setup(false).await;
        let viewer = student(10);
        let (session, _) = start(&store, &viewer, exam.id, now()).await.unwrap();
        submit(&store, &viewer, session.id, answers(&[(1, "B"), (2, "x")]), 5, now())
            .await
            .unwrap();

        let mut retry = NewSession {
            exam_id: exam.id,
            student_id: 10,
            course_id: 1,
            started_at: now(),
            deadline: now() + Duration::seconds(60),
            single_attempt: true,
        };
        let err = store.create_session(&retry).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        retry.single_attempt = false;
        assert!(store.create_session(&retry).await.is_ok());
    }

    #[tokio::test]
    async fn test_submit_after_grace_is_refused() {
        let (store, exam) = setup(false).await;
        let viewer = student(10);
        let (session, _) = start(&store, &viewer, exam.id, now()).await.unwrap();

        let within = session.deadline + Duration::seconds(3);
        let too_late = session.deadline + Duration::seconds(6);

        let err = submit(
            &store,
            &viewer,
            session.id,
            answers(&[(1, "A"), (2, "x")]),
            5,
            too_late,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let result = submit(
            &store,
            &viewer,
            session.id,
            answers(&[(1, "A"), (2, "x")]),
            5,
            within,
        )
        .await
        .unwrap();
        assert_eq!(result.total_marks, 0);
    }

    #[tokio::test]
    async fn test_drafts_rejected_after_deadline_or_for_unknown_questions() {
        let (store, exam) = setup(false).await;
        let viewer = student(10);
        let (session, _) = start(&store, &viewer, exam.id, now()).await.unwrap();

        let err = save_answers(&store, &viewer, session.id, answers(&[(9, "?")]), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = save_answers(
            &store,
            &viewer,
            session.id,
            answers(&[(1, "A")]),
            session.deadline,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_other_students_session_is_not_found() {
        let (store, exam) = setup(false).await;
        let (session, _) = start(&store, &student(10), exam.id, now()).await.unwrap();

        let err = load_owned(&store, &student(11), session.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_session_is_closed_on_restart() {
        let (store, exam) = setup(true).await;
        let viewer = student(10);
        let (first, _) = start(&store, &viewer, exam.id, now()).await.unwrap();

        let later = now() + Duration::minutes(5);
        let (second, _) = start(&store, &viewer, exam.id, later).await.unwrap();
        assert_ne!(second.id, first.id);

        let closed = store.get_session(first.id).await.unwrap().unwrap();
        assert_eq!(closed.status, SessionStatus::Submitted);
        assert_eq!(store.results_for_student(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_view_hides_answer_key() {
        let (store, exam) = setup(false).await;
        let (session, exam) = start(&store, &student(10), exam.id, now()).await.unwrap();

        let view = view(&session, Some(&exam), now() + Duration::seconds(15));
        assert_eq!(view.time_left_secs, 45);
        assert_eq!(view.questions.len(), 2);
        assert_eq!(
            view.phase,
            Phase::Running {
                deadline: session.deadline
            }
        );
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"]["state"], "running");
        assert!(!json.to_string().contains("correct_answer"));
    }
}
