// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    config::Config,
    error::AppError,
    models::session::AnswersRequest,
    services::{access::Viewer, session},
    store::Store,
    utils::jwt::Claims,
};

/// Starts an attempt, or returns the running one with its remaining time.
/// Student only.
pub async fn start_session(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let now = Utc::now();

    let (running, exam) = session::start(store.as_ref(), &viewer, exam_id, now).await?;
    Ok(Json(session::view(&running, Some(&exam), now)))
}

/// Current state of one of the caller's sessions.
/// Student only.
pub async fn get_session(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let current = session::load_owned(store.as_ref(), &viewer, id).await?;
    let exam = store.get_exam(current.exam_id).await?;

    Ok(Json(session::view(&current, exam.as_ref(), Utc::now())))
}

/// Saves draft answers; the forced submission uses the latest saved set.
/// Student only.
pub async fn save_answers(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let now = Utc::now();

    let updated = session::save_answers(store.as_ref(), &viewer, id, payload.answers, now).await?;
    let exam = store.get_exam(updated.exam_id).await?;

    Ok(Json(session::view(&updated, exam.as_ref(), now)))
}

/// Manual submission. Every question needs a non-empty answer.
/// Student only.
pub async fn submit_session(
    State(store): State<Arc<dyn Store>>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;

    let result = session::submit(
        store.as_ref(),
        &viewer,
        id,
        payload.answers,
        config.submission_grace_secs,
        Utc::now(),
    )
    .await?;

    Ok(Json(serde_json::json!({
        "result_id": result.id,
        "session_id": id,
        "submitted_at": result.submitted_at,
        "message": "Exam submitted successfully"
    })))
}
