use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, version, and which cache backend is active.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "dashboard",
        "cache_backend": state.orchestrator.domains().store().backend_kind(),
        "upstream": state.config.api_base_url,
        "processing": state.processing.snapshot().state,
    }))
}
