use std::sync::Arc;

use crate::config::Config;
use crate::orchestrator::FetchOrchestrator;
use crate::processing::ProcessingCoordinator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FetchOrchestrator>,
    pub processing: Arc<ProcessingCoordinator>,
    pub config: Config,
}
