// Pricing backend - HTTP front end over the batch fetch orchestrator
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Process-wide sliding-window rate limit against the SP-API
// - Bounded worker pool with per-item timeouts and retries
// - Structured logging with tracing
// - Graceful shutdown

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

pub mod config;
pub mod fetch;
pub mod marketplace;

mod handlers;
mod init;

use config::RuntimeConfig;
use fetch::{BatchOrchestrator, ItemFetcher};
use handlers::{
    asin_by_country, asin_in_default_marketplace, batch_by_country, config_view, health_check,
    not_found,
};
pub use init::{build_orchestrator, init_tracing};
use marketplace::{Marketplace, PricingRecord};

/// Any fetcher producing pricing records; the SP-API client in production.
pub type PricingFetcher = dyn ItemFetcher<Payload = PricingRecord>;
pub type PricingOrchestrator = BatchOrchestrator<PricingFetcher>;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PricingOrchestrator>,
    pub config: Arc<RuntimeConfig>,
    pub default_marketplace: Marketplace,
}

impl AppState {
    pub fn new(config: RuntimeConfig, orchestrator: PricingOrchestrator) -> Result<Self> {
        let default_marketplace = config.marketplace.default_marketplace()?;
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
            default_marketplace,
        })
    }
}

/// Error type that implements IntoResponse
pub(crate) struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request error: {:?}", self.error);
        } else {
            info!(status = self.status.as_u16(), "Request rejected: {}", self.error);
        }
        (
            self.status,
            Json(json!({
                "error": self.error.to_string(),
            })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err.into(),
        }
    }
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(error: anyhow::Error) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, error)
    }
}

/// Routes, CORS and request tracing over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/asin/batch/:country", post(batch_by_country))
        .route(
            "/asin/:key",
            get(asin_in_default_marketplace).post(asin_by_country),
        )
        .route("/health", get(health_check))
        .route("/config", get(config_view))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point for server mode (loads config automatically)
pub async fn run() -> Result<()> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    run_with_config(config).await
}

/// Entry point for server mode with pre-loaded configuration (for CLI usage)
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    info!("FBA pricing backend starting");

    let addr = config
        .server
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("server config required"))?
        .listen_addr
        .clone();

    let client = init::init_client(&config)?;
    let orchestrator = build_orchestrator(&config, client)?;
    let state = AppState::new(config, orchestrator)?;
    info!("Default marketplace: {}", state.default_marketplace);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Pricing endpoint listening on http://{}", addr);
    info!("Routes:");
    info!("  POST http://{}/asin/batch/:country - Batch pricing lookup", addr);
    info!("  GET  http://{}/asin/:asin          - Single lookup (default marketplace)", addr);
    info!("  POST http://{}/asin/:country       - Single lookup", addr);
    info!("  GET  http://{}/health              - Health check", addr);
    info!("  GET  http://{}/config              - Effective settings", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");

    Ok(())
}
