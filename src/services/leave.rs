// src/services/leave.rs

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    error::AppError,
    models::{
        attendance::AttendanceStatus,
        leave::{LeaveListQuery, LeaveRequest, LeaveRequestInput, LeaveStatus, NewLeaveRequest},
    },
    services::access::Viewer,
    store::{Store, StoreResult},
};

fn leave_not_found() -> AppError {
    AppError::NotFound("Leave request not found".to_string())
}

fn already_decided(request: &LeaveRequest) -> AppError {
    AppError::Conflict(format!(
        "Leave request was already {}",
        request.status.as_str()
    ))
}

fn clean_reason(input: &LeaveRequestInput) -> Result<String, AppError> {
    let reason = input.reason.trim();
    if reason.is_empty() {
        return Err(AppError::BadRequest("Please provide a reason.".to_string()));
    }
    Ok(reason.to_string())
}

/// Files a pending request for a day of the student's own course.
pub async fn request(
    store: &dyn Store,
    viewer: &Viewer,
    input: &LeaveRequestInput,
    now: DateTime<Utc>,
) -> Result<LeaveRequest, AppError> {
    let student = viewer.student_profile();
    let Some(course_id) = student.course_id else {
        return Err(AppError::BadRequest(
            "Your profile has no course; leave cannot be requested".to_string(),
        ));
    };

    let created = store
        .create_leave_request(&NewLeaveRequest {
            student_id: student.id,
            student_name: student.name,
            course_id,
            date: input.date,
            reason: clean_reason(input)?,
            created_at: now,
        })
        .await?;
    tracing::info!(
        "Leave request {} filed by student {} for {}",
        created.id,
        created.student_id,
        created.date
    );
    Ok(created)
}

async fn load_own(store: &dyn Store, viewer: &Viewer, id: i64) -> Result<LeaveRequest, AppError> {
    store
        .get_leave_request(id)
        .await?
        .filter(|r| r.student_id == viewer.user_id)
        .ok_or_else(leave_not_found)
}

/// Changes date or reason while the request is pending.
pub async fn edit(
    store: &dyn Store,
    viewer: &Viewer,
    id: i64,
    input: &LeaveRequestInput,
) -> Result<LeaveRequest, AppError> {
    let mut current = load_own(store, viewer, id).await?;
    let reason = clean_reason(input)?;

    if !store
        .update_pending_leave_request(id, input.date, &reason)
        .await?
    {
        let latest = store.get_leave_request(id).await?.ok_or_else(leave_not_found)?;
        return Err(already_decided(&latest));
    }

    current.date = input.date;
    current.reason = reason;
    Ok(current)
}

/// Deletes a request while it is pending.
pub async fn withdraw(store: &dyn Store, viewer: &Viewer, id: i64) -> Result<(), AppError> {
    let current = load_own(store, viewer, id).await?;
    if !store.delete_pending_leave_request(id).await? {
        let latest = store.get_leave_request(id).await?.unwrap_or(current);
        return Err(already_decided(&latest));
    }
    Ok(())
}

/// Requests on courses the viewer manages, newest first.
pub async fn list_for_staff(
    store: &dyn Store,
    viewer: &Viewer,
    query: &LeaveListQuery,
) -> Result<Vec<LeaveRequest>, AppError> {
    if let Some(course_id) = query.course_id {
        if !viewer.can_access_course(course_id) {
            return Err(AppError::NotFound("Course not found".to_string()));
        }
    }

    Ok(store
        .list_leave_requests(query.course_id, None)
        .await?
        .into_iter()
        .filter(|r| viewer.can_access_course(r.course_id))
        .filter(|r| query.status.is_none_or(|s| r.status == s))
        .collect())
}

/// Approves or rejects a pending request.
///
/// Approval marks the student absent for that day. Repeating the decision a
/// request already has is accepted and re-applies it; the opposite decision
/// is a conflict.
pub async fn decide(
    store: &dyn Store,
    viewer: &Viewer,
    id: i64,
    decision: LeaveStatus,
) -> Result<LeaveRequest, AppError> {
    if decision == LeaveStatus::Pending {
        return Err(AppError::BadRequest(
            "A decision must approve or reject".to_string(),
        ));
    }

    let current = store
        .get_leave_request(id)
        .await?
        .filter(|r| viewer.can_access_course(r.course_id))
        .ok_or_else(leave_not_found)?;

    let decided = match store
        .decide_leave_request(id, decision, viewer.user_id)
        .await?
    {
        Some(decided) => decided,
        None => {
            let latest = store.get_leave_request(id).await?.unwrap_or(current);
            if latest.status != decision {
                return Err(already_decided(&latest));
            }
            latest
        }
    };

    if decided.status == LeaveStatus::Approved {
        store
            .mark_attendance(
                decided.course_id,
                decided.date,
                &[(decided.student_id, AttendanceStatus::Absent)],
            )
            .await?;
    }

    tracing::info!(
        "Leave request {} {} by user {}",
        decided.id,
        decided.status.as_str(),
        viewer.user_id
    );
    Ok(decided)
}

/// Students of a course with approved leave on `date`.
pub async fn approved_on(
    store: &dyn Store,
    course_id: i64,
    date: NaiveDate,
) -> StoreResult<HashSet<i64>> {
    Ok(store
        .list_leave_requests(Some(course_id), None)
        .await?
        .into_iter()
        .filter(|r| r.date == date && r.status == LeaveStatus::Approved)
        .map(|r| r.student_id)
        .collect())
}
