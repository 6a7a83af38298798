use std::convert::Infallible;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde_json::{json, Value};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::processing::ProcessingSnapshot;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

/// POST /api/v1/resume
/// Expects a multipart body with the resume under the `file` field.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ProcessingSnapshot>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("resume").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        info!(file_name = %file_name, size = bytes.len(), "forwarding resume upload");
        let snapshot = state
            .processing
            .upload_resume(&file_name, &content_type, bytes)
            .await?;
        return Ok((StatusCode::ACCEPTED, Json(snapshot)));
    }

    Err(AppError::Validation(format!(
        "Multipart field '{FILE_FIELD}' is required"
    )))
}

/// GET /api/v1/processing
pub async fn handle_get_processing(State(state): State<AppState>) -> Json<ProcessingSnapshot> {
    Json(state.processing.snapshot())
}

/// GET /api/v1/processing/events
/// Server-sent events, one per notice published by the processing
/// coordinator. The event name is the notice kind.
pub async fn handle_processing_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let notices = BroadcastStream::new(state.processing.subscribe()).filter_map(|received| {
        match received {
            Ok(notice) => match Event::default().event(notice.kind.as_str()).json_data(&notice) {
                Ok(event) => Some(Ok::<_, Infallible>(event)),
                Err(e) => {
                    warn!("dropping notice that failed to encode: {e}");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "notice subscriber lagged");
                None
            }
        }
    });

    Sse::new(notices).keep_alive(KeepAlive::default())
}

/// POST /api/v1/processing/reset
pub async fn handle_reset_processing(State(state): State<AppState>) -> Json<ProcessingSnapshot> {
    Json(state.processing.reset_processing())
}

/// POST /api/v1/cache/reset
/// Drops every cached domain, as on sign-out.
pub async fn handle_reset_cache(State(state): State<AppState>) -> Json<Value> {
    state.orchestrator.reset_all().await;
    info!("all cache domains reset");
    Json(json!({ "status": "cleared" }))
}
