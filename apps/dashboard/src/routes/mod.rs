pub mod dashboard;
pub mod health;
pub mod matches;
pub mod processing;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Job matches
        .route(
            "/api/v1/matches",
            get(matches::handle_get_matches).delete(matches::handle_clear_matches),
        )
        .route("/api/v1/matches/stats", get(matches::handle_get_stats))
        .route(
            "/api/v1/matches/regenerate",
            post(matches::handle_regenerate),
        )
        // Saved jobs
        .route(
            "/api/v1/saved-jobs",
            get(dashboard::handle_get_saved_jobs),
        )
        .route(
            "/api/v1/saved-jobs/:job_id",
            post(dashboard::handle_save_job).delete(dashboard::handle_unsave_job),
        )
        // Profile
        .route(
            "/api/v1/profile",
            get(dashboard::handle_get_profile).put(dashboard::handle_update_profile),
        )
        .route("/api/v1/profile/skills", get(dashboard::handle_get_skills))
        .route(
            "/api/v1/profile/education",
            get(dashboard::handle_get_education),
        )
        .route(
            "/api/v1/profile/experience",
            get(dashboard::handle_get_experience),
        )
        // Dashboard
        .route(
            "/api/v1/dashboard/stats",
            get(dashboard::handle_get_dashboard_stats),
        )
        .route(
            "/api/v1/dashboard/matches",
            get(dashboard::handle_get_dashboard_matches),
        )
        // Resume upload and processing
        .route("/api/v1/resume", post(processing::handle_upload_resume))
        .route("/api/v1/processing", get(processing::handle_get_processing))
        .route(
            "/api/v1/processing/events",
            get(processing::handle_processing_events),
        )
        .route(
            "/api/v1/processing/reset",
            post(processing::handle_reset_processing),
        )
        .route("/api/v1/cache/reset", post(processing::handle_reset_cache))
        .with_state(state)
}
