use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::errors::AppError;
use crate::models::jobs::{DashboardStats, JobMatch, SavedJob};
use crate::models::profile::{Education, Experience, ProfileUpdate, Skill, UserProfile};
use crate::orchestrator::Fetched;
use crate::routes::matches::TriggerParams;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Saved jobs
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/saved-jobs
pub async fn handle_get_saved_jobs(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Json<Fetched<Vec<SavedJob>>> {
    Json(
        state
            .orchestrator
            .fetch_saved_jobs(params.trigger.unwrap_or_default())
            .await,
    )
}

/// POST /api/v1/saved-jobs/:job_id
pub async fn handle_save_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Fetched<Vec<SavedJob>>>, AppError> {
    let job_id = validate_job_id(&job_id)?;
    Ok(Json(state.orchestrator.save_job(job_id).await?))
}

/// DELETE /api/v1/saved-jobs/:job_id
pub async fn handle_unsave_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Fetched<Vec<SavedJob>>>, AppError> {
    let job_id = validate_job_id(&job_id)?;
    Ok(Json(state.orchestrator.unsave_job(job_id).await?))
}

/// Job ids are opaque single path segments upstream.
fn validate_job_id(job_id: &str) -> Result<&str, AppError> {
    let trimmed = job_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("job_id must not be empty".to_string()));
    }
    if trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        return Err(AppError::Validation(format!(
            "job_id '{trimmed}' is not a valid identifier"
        )));
    }
    Ok(trimmed)
}

// ────────────────────────────────────────────────────────────────────────────
// Profile
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Json<Fetched<UserProfile>> {
    Json(
        state
            .orchestrator
            .fetch_profile(params.trigger.unwrap_or_default())
            .await,
    )
}

/// PUT /api/v1/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Fetched<UserProfile>>, AppError> {
    Ok(Json(state.orchestrator.update_profile(&update).await?))
}

/// GET /api/v1/profile/skills
pub async fn handle_get_skills(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Json<Fetched<Vec<Skill>>> {
    Json(
        state
            .orchestrator
            .fetch_skills(params.trigger.unwrap_or_default())
            .await,
    )
}

/// GET /api/v1/profile/education
pub async fn handle_get_education(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Json<Fetched<Vec<Education>>> {
    Json(
        state
            .orchestrator
            .fetch_education(params.trigger.unwrap_or_default())
            .await,
    )
}

/// GET /api/v1/profile/experience
pub async fn handle_get_experience(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Json<Fetched<Vec<Experience>>> {
    Json(
        state
            .orchestrator
            .fetch_experience(params.trigger.unwrap_or_default())
            .await,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Dashboard
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/dashboard/stats
pub async fn handle_get_dashboard_stats(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Json<Fetched<DashboardStats>> {
    Json(
        state
            .orchestrator
            .fetch_dashboard_stats(params.trigger.unwrap_or_default())
            .await,
    )
}

/// GET /api/v1/dashboard/matches
pub async fn handle_get_dashboard_matches(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Json<Fetched<Vec<JobMatch>>> {
    Json(
        state
            .orchestrator
            .fetch_dashboard_matches(params.trigger.unwrap_or_default())
            .await,
    )
}
