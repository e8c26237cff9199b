// src/models/mod.rs

pub mod attendance;
pub mod course;
pub mod exam;
pub mod leave;
pub mod result;
pub mod session;
pub mod user;
