// src/handlers/exam.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam::{AvailableExam, Exam, ExamInput, ExamListQuery},
        result::StaffResultView,
    },
    services::{
        access::{Viewer, exam_not_found},
        eligibility::{self, Eligibility},
    },
    store::Store,
    utils::jwt::Claims,
};

/// Loads an exam the caller may manage.
async fn managed_exam(store: &dyn Store, viewer: &Viewer, id: i64) -> Result<Exam, AppError> {
    store
        .get_exam(id)
        .await?
        .filter(|e| viewer.can_access_course(e.course_id))
        .ok_or_else(exam_not_found)
}

async fn ensure_course(store: &dyn Store, viewer: &Viewer, course_id: i64) -> Result<(), AppError> {
    if !viewer.can_access_course(course_id) || store.get_course(course_id).await?.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }
    Ok(())
}

/// Creates an exam for a course the caller manages.
/// Staff only.
pub async fn create_exam(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ExamInput>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    ensure_course(store.as_ref(), &viewer, payload.course_id).await?;

    let exam = store.create_exam(&payload.into_exam(0)).await?;
    tracing::info!(
        "Exam {} created for course {} by user {}",
        exam.id,
        exam.course_id,
        viewer.user_id
    );

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Lists exams, optionally for one course. Teachers only see their courses.
/// Staff only.
pub async fn list_exams(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ExamListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;

    let exams: Vec<Exam> = store
        .list_exams(params.course_id)
        .await?
        .into_iter()
        .filter(|e| viewer.can_access_course(e.course_id))
        .collect();

    Ok(Json(exams))
}

/// Full exam definition, answer keys included.
/// Staff only.
pub async fn get_exam(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let exam = managed_exam(store.as_ref(), &viewer, id).await?;
    Ok(Json(exam))
}

/// Replaces an exam definition. Locked once any result exists.
/// Staff only.
pub async fn update_exam(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<ExamInput>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    managed_exam(store.as_ref(), &viewer, id).await?;
    ensure_course(store.as_ref(), &viewer, payload.course_id).await?;

    if !store.results_for_exam(id).await?.is_empty() {
        return Err(AppError::Conflict(
            "Exam already has results and can no longer be edited".to_string(),
        ));
    }

    let exam = payload.into_exam(id);
    if !store.update_exam(&exam).await? {
        return Err(exam_not_found());
    }
    tracing::info!("Exam {} updated by user {}", id, viewer.user_id);

    Ok(Json(exam))
}

/// Deletes an exam. Its results stay readable by staff.
/// Staff only.
pub async fn delete_exam(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    managed_exam(store.as_ref(), &viewer, id).await?;

    if !store.delete_exam(id).await? {
        return Err(exam_not_found());
    }
    tracing::info!("Exam {} deleted by user {}", id, viewer.user_id);

    Ok(StatusCode::NO_CONTENT)
}

/// All results of an exam with the student's name.
/// Staff only.
pub async fn list_exam_results(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    managed_exam(store.as_ref(), &viewer, id).await?;

    let mut views = Vec::new();
    for result in store.results_for_exam(id).await? {
        let student_name = store
            .get_user(result.student_id)
            .await?
            .map(|u| u.name)
            .unwrap_or_default();
        views.push(StaffResultView {
            student_name,
            pending_evaluation: result.has_pending(),
            result,
        });
    }

    Ok(Json(views))
}

#[derive(Debug, Serialize)]
pub struct AvailableExamsResponse {
    #[serde(flatten)]
    pub eligibility: Eligibility,

    /// Set instead of an exam list when the student is not eligible.
    pub message: Option<String>,
    pub exams: Vec<AvailableExam>,
}

/// Exams the student can start right now.
///
/// Empty, with an explanation, while monthly attendance is below the threshold.
/// Student only.
pub async fn list_available_exams(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let student = viewer.student_profile();
    let now = Utc::now();

    let gate = eligibility::check(store.as_ref(), &student, now.date_naive()).await?;
    let message = gate.message();

    let mut exams = Vec::new();
    if let (true, Some(course_id)) = (gate.eligible, student.course_id) {
        let course_name = store
            .get_course(course_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_default();
        let attempted: Vec<i64> = store
            .results_for_student(student.id)
            .await?
            .iter()
            .map(|r| r.exam_id)
            .collect();

        exams = store
            .list_exams(Some(course_id))
            .await?
            .into_iter()
            .filter(|e| e.is_active_at(now))
            .filter(|e| e.multiple_attempts || !attempted.contains(&e.id))
            .map(|e| AvailableExam {
                id: e.id,
                name: e.name,
                description: e.description,
                course_id: e.course_id,
                course_name: course_name.clone(),
                end_time: e.end_time,
                duration_minutes: e.duration_minutes,
                question_count: e.questions.len(),
            })
            .collect();
    }

    Ok(Json(AvailableExamsResponse {
        eligibility: gate,
        message,
        exams,
    }))
}
