// src/handlers/leave.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::leave::{LeaveListQuery, LeaveRequestInput, LeaveStatus},
    services::{access::Viewer, leave},
    store::Store,
    utils::jwt::Claims,
};

/// Files a leave request for a day of the caller's course.
/// Student only.
pub async fn request_leave(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<LeaveRequestInput>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let viewer = Viewer::load(store.as_ref(), &claims).await?;

    let created = leave::request(store.as_ref(), &viewer, &payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// The caller's own requests, newest first.
/// Student only.
pub async fn my_leave_requests(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let requests = store
        .list_leave_requests(None, Some(viewer.user_id))
        .await?;
    Ok(Json(requests))
}

/// Student only. Pending requests only.
pub async fn update_leave_request(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<LeaveRequestInput>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let viewer = Viewer::load(store.as_ref(), &claims).await?;

    let updated = leave::edit(store.as_ref(), &viewer, id, &payload).await?;
    Ok(Json(updated))
}

/// Student only. Pending requests only.
pub async fn withdraw_leave_request(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    leave::withdraw(store.as_ref(), &viewer, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Requests on the caller's courses, optionally filtered by course and status.
/// Staff only.
pub async fn list_leave_requests(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LeaveListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let requests = leave::list_for_staff(store.as_ref(), &viewer, &query).await?;
    Ok(Json(requests))
}

/// Approves a request and records the day as absent.
/// Staff only.
pub async fn approve_leave_request(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let decided = leave::decide(store.as_ref(), &viewer, id, LeaveStatus::Approved).await?;
    Ok(Json(decided))
}

/// Staff only.
pub async fn reject_leave_request(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let decided = leave::decide(store.as_ref(), &viewer, id, LeaveStatus::Rejected).await?;
    Ok(Json(decided))
}
