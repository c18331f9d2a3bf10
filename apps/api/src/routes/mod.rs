pub mod applications;
pub mod companies;
pub mod health;
pub mod jobs;
mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;

/// Headroom for the non-file multipart fields on top of the résumé itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.screening.max_resume_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Applications
        .route(
            "/api/v1/applications",
            post(applications::handle_submit).get(applications::handle_list),
        )
        .route(
            "/api/v1/applications/:id",
            get(applications::handle_get)
                .patch(applications::handle_update_status)
                .delete(applications::handle_delete),
        )
        .route(
            "/api/v1/applications/:id/track",
            get(applications::handle_track),
        )
        .route(
            "/api/v1/applications/:id/eligibility",
            get(applications::handle_eligibility),
        )
        .route(
            "/api/v1/applications/:id/invite",
            post(applications::handle_manual_invite),
        )
        .route(
            "/api/v1/applications/:id/interview/complete",
            post(applications::handle_complete_interview),
        )
        // Jobs
        .route("/api/v1/jobs", post(jobs::handle_create))
        .route("/api/v1/jobs/match", post(jobs::handle_match))
        .route("/api/v1/jobs/:id", get(jobs::handle_get).delete(jobs::handle_delete))
        .route("/api/v1/jobs/:id/status", patch(jobs::handle_update_status))
        // Companies
        .route(
            "/api/v1/companies/:id/audit",
            get(companies::handle_audit),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
