pub mod health;
pub mod jobs;
pub mod matches;
pub mod resumes;
pub mod usage;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::get,
    Router,
};

use crate::realtime;
use crate::state::AppState;
use crate::storage::MAX_UPLOAD_BYTES;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/health", get(health::health_handler))
        // ── Résumés ────────────────────────────────────────────────────────
        .route(
            "/api/v1/resumes",
            get(resumes::handle_list_resumes).post(resumes::handle_upload_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resumes::handle_get_resume).delete(resumes::handle_delete_resume),
        )
        // ── Job descriptions ───────────────────────────────────────────────
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route(
            "/api/v1/jobs/:id",
            get(jobs::handle_get_job).delete(jobs::handle_delete_job),
        )
        // ── Matches & quota ────────────────────────────────────────────────
        .route(
            "/api/v1/matches",
            get(matches::handle_list_matches).post(matches::handle_create_match),
        )
        .route("/api/v1/matches/:id", get(matches::handle_get_match))
        .route("/api/v1/usage", get(usage::handle_get_usage))
        // ── Realtime push (same port, same bearer token) ───────────────────
        .route("/ws", get(realtime::ws_handler))
        // Multipart bodies carry the 10 MiB file plus framing overhead.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .with_state(state)
}
