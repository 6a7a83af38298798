mod api_client;
mod auth;
mod cache;
mod clock;
mod config;
mod errors;
mod models;
mod notifications;
mod orchestrator;
mod processing;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api_client::{HttpJobApi, JobApi};
use crate::auth::TokenHolder;
use crate::cache::{CacheDomains, EntryStore, FileBackend, MemoryBackend, RedisBackend, StorageBackend};
use crate::clock::SystemClock;
use crate::config::{CacheBackendKind, Config};
use crate::orchestrator::FetchOrchestrator;
use crate::processing::ProcessingCoordinator;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dashboard v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the cache backend
    let backend = build_backend(&config).await?;
    info!("Cache backend initialized ({})", backend.kind());

    let store = EntryStore::new(backend, Arc::new(SystemClock), config.cache_namespace.clone());
    let domains = Arc::new(CacheDomains::new(store, config.ttl));

    // Initialize the remote job API client
    let tokens = Arc::new(TokenHolder::new(config.api_token.clone()));
    let api: Arc<dyn JobApi> = Arc::new(HttpJobApi::new(
        &config.api_base_url,
        tokens.clone(),
        config.request_timeout,
    )?);
    info!("Job API client initialized ({})", config.api_base_url);

    let orchestrator = Arc::new(FetchOrchestrator::new(
        api.clone(),
        domains,
        tokens,
        config.recommendations,
    ));
    let processing = ProcessingCoordinator::new(api, orchestrator.clone(), config.poll);

    // Adopt a job that was already processing before this process started
    let detector = processing.clone();
    tokio::spawn(async move {
        let snapshot = detector.detect_in_progress().await;
        info!("Initial processing state: {:?}", snapshot.state);
    });

    // Build app state
    let state = AppState {
        orchestrator,
        processing: processing.clone(),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    processing.shutdown();
    Ok(())
}

/// Builds the storage backend selected by `CACHE_BACKEND`.
async fn build_backend(config: &Config) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.cache_backend {
        CacheBackendKind::Memory => Arc::new(MemoryBackend::new()),
        CacheBackendKind::File => Arc::new(FileBackend::open(config.cache_dir.clone()).await?),
        CacheBackendKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("REDIS_URL is required when CACHE_BACKEND=redis"))?;
            let client = redis::Client::open(url)?;
            Arc::new(RedisBackend::connect(&client).await?)
        }
    };
    Ok(backend)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
