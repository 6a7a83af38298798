use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::jobs::{MatchFeed, MatchingStats};
use crate::orchestrator::{FetchTrigger, Fetched, MatchQuery};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MatchesParams {
    pub trigger: Option<FetchTrigger>,
    /// Falls back to the live processing state when omitted.
    pub upload_in_progress: Option<bool>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerParams {
    pub trigger: Option<FetchTrigger>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

/// GET /api/v1/matches
pub async fn handle_get_matches(
    State(state): State<AppState>,
    Query(params): Query<MatchesParams>,
) -> Json<Fetched<MatchFeed>> {
    let upload_in_progress = params
        .upload_in_progress
        .unwrap_or_else(|| state.processing.snapshot().state.is_in_progress());

    let query = MatchQuery::new(params.trigger.unwrap_or_default())
        .with_upload_in_progress(upload_in_progress)
        .with_limit(params.limit);

    Json(state.orchestrator.fetch_job_matches(query).await)
}

/// GET /api/v1/matches/stats
pub async fn handle_get_stats(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Json<Fetched<MatchingStats>> {
    Json(
        state
            .orchestrator
            .fetch_matching_stats(params.trigger.unwrap_or_default())
            .await,
    )
}

/// POST /api/v1/matches/regenerate
pub async fn handle_regenerate(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Fetched<MatchFeed>>, AppError> {
    let fetched = state.orchestrator.regenerate_matches(params.limit).await?;
    Ok(Json(fetched))
}

/// DELETE /api/v1/matches
pub async fn handle_clear_matches(
    State(state): State<AppState>,
) -> Result<Json<Fetched<MatchFeed>>, AppError> {
    let fetched = state.orchestrator.clear_matches().await?;
    Ok(Json(fetched))
}
