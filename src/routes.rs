// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attendance, course, exam, leave, result, session},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, staff_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Every route requires a bearer token; role groups add a role check on top.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store and config).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let admin_routes = Router::new()
        .route("/courses", post(admin::create_course))
        .route("/courses/{id}", delete(admin::delete_course))
        .route("/users/{id}", put(admin::upsert_user))
        .route(
            "/settings/attendance",
            get(admin::get_attendance_settings).put(admin::update_attendance_settings),
        )
        .route("/exams/{id}/publish", post(admin::publish_results))
        .route("/results/{id}", delete(admin::delete_result))
        .layer(middleware::from_fn(admin_middleware));

    let staff_routes = Router::new()
        .route("/exams", post(exam::create_exam).get(exam::list_exams))
        .route(
            "/exams/{id}",
            get(exam::get_exam)
                .put(exam::update_exam)
                .delete(exam::delete_exam),
        )
        .route("/exams/{id}/results", get(exam::list_exam_results))
        .route(
            "/attendance/{course_id}/{date}",
            put(attendance::mark_attendance),
        )
        .route("/results/{id}/marks", put(result::grade_result))
        .route("/leave-requests", get(leave::list_leave_requests))
        .route(
            "/leave-requests/{id}/approve",
            post(leave::approve_leave_request),
        )
        .route("/leave-requests/{id}/reject", post(leave::reject_leave_request))
        .layer(middleware::from_fn(staff_middleware));

    let student_routes = Router::new()
        .route("/attendance", get(attendance::my_attendance))
        .route(
            "/leave-requests",
            post(leave::request_leave).get(leave::my_leave_requests),
        )
        .route(
            "/leave-requests/{id}",
            put(leave::update_leave_request).delete(leave::withdraw_leave_request),
        )
        .route("/exams", get(exam::list_available_exams))
        .route("/exams/{id}/session", post(session::start_session))
        .route("/sessions/{id}", get(session::get_session))
        .route("/sessions/{id}/answers", put(session::save_answers))
        .route("/sessions/{id}/submit", post(session::submit_session))
        .route("/results", get(result::my_results))
        .route("/results/{id}", get(result::my_result))
        .layer(middleware::from_fn(student_middleware));

    // Role checks run inside the auth layer, which injects the claims.
    let api_routes = Router::new()
        .route("/courses", get(course::list_courses))
        .nest("/admin", admin_routes)
        .nest("/staff", staff_routes)
        .nest("/student", student_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
