// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attendance::AttendanceSettings,
        course::CreateCourseRequest,
        result::PublishRequest,
        user::UpsertUserRequest,
    },
    services::{access::result_not_found, publish},
    store::Store,
};

/// Creates a course.
/// Admin only.
pub async fn create_course(
    State(store): State<Arc<dyn Store>>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let subjects: Vec<String> = payload
        .subjects
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let course = store.create_course(payload.name.trim(), &subjects).await?;
    tracing::info!("Course {} created: {}", course.id, course.name);

    Ok((StatusCode::CREATED, Json(course)))
}

/// Deletes a course. Exams and results referring to it are left in place.
/// Admin only.
pub async fn delete_course(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_course(id).await? {
        return Err(AppError::NotFound("Course not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Creates or replaces the directory profile of a user.
/// Admin only.
pub async fn upsert_user(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpsertUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if let Some(course_id) = payload.course_id {
        if store.get_course(course_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "Course {} does not exist",
                course_id
            )));
        }
    }

    let profile = payload.into_profile(id);
    store.upsert_user(&profile).await?;

    Ok(Json(profile))
}

pub async fn get_attendance_settings(
    State(store): State<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.attendance_settings().await?))
}

/// Replaces the global attendance policy.
/// Admin only.
pub async fn update_attendance_settings(
    State(store): State<Arc<dyn Store>>,
    Json(payload): Json<AttendanceSettings>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    store.save_attendance_settings(&payload).await?;
    tracing::info!("Attendance settings updated: {:?}", payload);

    Ok(Json(payload))
}

/// Sets the publish gate on every result of an exam.
/// Admin only.
pub async fn publish_results(
    State(store): State<Arc<dyn Store>>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<PublishRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = publish::publish(store.as_ref(), exam_id, &payload).await?;
    Ok(Json(response))
}

/// Deletes a result. For single-attempt exams this lets the student sit the exam again.
/// Admin only.
pub async fn delete_result(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete_result(id).await? {
        return Err(result_not_found());
    }
    tracing::info!("Result {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
