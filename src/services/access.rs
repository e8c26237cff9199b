// src/services/access.rs

use crate::{
    error::AppError,
    models::user::{Role, UserProfile},
    store::Store,
    utils::jwt::Claims,
};

/// The caller of a request, resolved against the user directory.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: i64,
    pub role: Role,
    pub profile: Option<UserProfile>,
}

impl Viewer {
    pub async fn load(store: &dyn Store, claims: &Claims) -> Result<Self, AppError> {
        let user_id = claims.user_id()?;
        let role = claims
            .role()
            .ok_or_else(|| AppError::AuthError("Unknown role in token".to_string()))?;
        let profile = store.get_user(user_id).await?;
        Ok(Self {
            user_id,
            role,
            profile,
        })
    }

    /// Admins see every course, teachers their assigned ones, students their own.
    pub fn can_access_course(&self, course_id: i64) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Teacher => self
                .profile
                .as_ref()
                .is_some_and(|p| p.assigned_courses.contains(&course_id)),
            Role::Student => self
                .profile
                .as_ref()
                .is_some_and(|p| p.course_id == Some(course_id)),
        }
    }

    /// Profile to use for student-side checks. A student missing from the
    /// directory is treated as one without a course.
    pub fn student_profile(&self) -> UserProfile {
        self.profile.clone().unwrap_or_else(|| UserProfile {
            id: self.user_id,
            name: String::new(),
            role: Role::Student,
            course_id: None,
            assigned_courses: Vec::new(),
        })
    }
}

pub fn exam_not_found() -> AppError {
    AppError::NotFound("Exam not found or you do not have permission".to_string())
}

pub fn result_not_found() -> AppError {
    AppError::NotFound("Result not found".to_string())
}
