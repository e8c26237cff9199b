// src/handlers/result.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::result::{ExamResult, GradeRequest, StudentResultView},
    services::{
        access::{Viewer, exam_not_found, result_not_found},
        publish::is_visible,
        scoring::{self, GradeError},
    },
    store::Store,
    utils::jwt::Claims,
};

/// Saves grader marks for written answers. Marks are clamped to each question's range.
/// Staff only.
pub async fn grade_result(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<GradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;

    let mut result = store
        .get_result(id)
        .await?
        .filter(|r| viewer.can_access_course(r.course_id))
        .ok_or_else(result_not_found)?;
    let exam = store
        .get_exam(result.exam_id)
        .await?
        .ok_or_else(exam_not_found)?;

    let changed = scoring::apply_grades(&mut result, &exam.questions, &payload.marks).map_err(
        |GradeError::UnknownQuestions(ids)| {
            AppError::BadRequest(format!("Result has no answers for questions {:?}", ids))
        },
    )?;

    if !store.save_grades(&result).await? {
        return Err(result_not_found());
    }
    tracing::info!(
        "Result {} graded by user {}: questions {:?}, total {}",
        id,
        viewer.user_id,
        changed,
        result.total_marks
    );

    Ok(Json(result))
}

async fn student_view(store: &dyn Store, result: ExamResult) -> Result<StudentResultView, AppError> {
    let exam = store.get_exam(result.exam_id).await?;
    let (exam_name, max_marks) = match exam {
        Some(e) => {
            let max_marks = e.max_marks();
            (e.name, max_marks)
        }
        None => (String::new(), 0),
    };
    Ok(StudentResultView {
        id: result.id,
        exam_id: result.exam_id,
        exam_name,
        total_marks: result.total_marks,
        max_marks,
        answers: result.answers,
        submitted_at: result.submitted_at,
    })
}

/// Published results of the calling student.
/// Student only.
pub async fn my_results(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let now = Utc::now();

    let mut views = Vec::new();
    for result in store.results_for_student(user_id).await? {
        if is_visible(&result, now) {
            views.push(student_view(store.as_ref(), result).await?);
        }
    }

    Ok(Json(views))
}

/// One published result of the calling student.
/// Unpublished and foreign results are reported as missing.
pub async fn my_result(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let result = store
        .get_result(id)
        .await?
        .filter(|r| r.student_id == user_id && is_visible(r, Utc::now()))
        .ok_or_else(result_not_found)?;

    Ok(Json(student_view(store.as_ref(), result).await?))
}
