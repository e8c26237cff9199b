// src/handlers/attendance.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde_json::json;

use crate::{
    error::AppError,
    models::attendance::{AttendanceLedger, AttendanceStatus, MarkAttendanceRequest},
    services::{access::Viewer, attendance, leave},
    store::Store,
    utils::jwt::Claims,
};

/// Marks attendance of one course day. Re-marking a student overwrites the day's entry.
/// Students with approved leave that day stay absent.
/// Staff only.
pub async fn mark_attendance(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path((course_id, date)): Path<(i64, NaiveDate)>,
    Json(payload): Json<MarkAttendanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    if !viewer.can_access_course(course_id) || store.get_course(course_id).await?.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    if payload.entries.is_empty() {
        return Err(AppError::BadRequest("No attendance entries".to_string()));
    }

    let on_leave = leave::approved_on(store.as_ref(), course_id, date).await?;
    let mut entries: Vec<(i64, AttendanceStatus)> = payload
        .entries
        .into_iter()
        .map(|(student_id, status)| {
            if on_leave.contains(&student_id) {
                (student_id, AttendanceStatus::Absent)
            } else {
                (student_id, status)
            }
        })
        .collect();
    entries.sort_unstable_by_key(|(student_id, _)| *student_id);
    let mut on_leave: Vec<i64> = on_leave.into_iter().collect();
    on_leave.sort_unstable();

    store.mark_attendance(course_id, date, &entries).await?;
    tracing::info!(
        "Attendance for course {} on {} marked by user {} ({} students)",
        course_id,
        date,
        viewer.user_id,
        entries.len()
    );

    Ok(Json(json!({
        "course_id": course_id,
        "date": date,
        "marked": entries.len(),
        "on_leave": on_leave,
    })))
}

/// Attendance overview of the calling student.
/// Student only.
pub async fn my_attendance(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::load(store.as_ref(), &claims).await?;
    let student = viewer.student_profile();

    let ledger = match student.course_id {
        Some(course_id) => store.course_ledger(course_id).await?,
        None => AttendanceLedger::new(),
    };
    let settings = store.attendance_settings().await?;

    Ok(Json(attendance::summarize(
        &ledger,
        student.id,
        student.course_id,
        Utc::now().date_naive(),
        &settings,
    )))
}
