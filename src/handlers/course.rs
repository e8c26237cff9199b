// src/handlers/course.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::{error::AppError, store::Store};

/// Lists all courses.
/// Public to any authenticated user.
pub async fn list_courses(
    State(store): State<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(store.list_courses().await?))
}
