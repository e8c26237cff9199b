// src/services/mod.rs

// Exam and attendance rules, independent of HTTP. Functions that depend on
// the current time take `now` explicitly; handlers pass `Utc::now()`.

pub mod access;
pub mod attendance;
pub mod eligibility;
pub mod expiry;
pub mod leave;
pub mod publish;
pub mod scoring;
pub mod session;
