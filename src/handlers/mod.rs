// src/handlers/mod.rs

pub mod admin;
pub mod attendance;
pub mod course;
pub mod exam;
pub mod leave;
pub mod result;
pub mod session;
