// src/models/user.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

/// Directory entry for one user. Identity itself lives with the token issuer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub role: Role,

    /// Students belong to at most one course.
    pub course_id: Option<i64>,

    /// Courses a teacher may manage.
    #[serde(default)]
    pub assigned_courses: Vec<i64>,
}

/// DTO for the admin upsert of a profile.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub role: Role,
    pub course_id: Option<i64>,
    #[serde(default)]
    pub assigned_courses: Vec<i64>,
}

impl UpsertUserRequest {
    pub fn into_profile(self, id: i64) -> UserProfile {
        UserProfile {
            id,
            name: self.name,
            role: self.role,
            course_id: self.course_id,
            assigned_courses: self.assigned_courses,
        }
    }
}
