// Initialization utilities for server mode
//
// Fetch pipeline wiring and logging/tracing setup

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{LogFormat, RuntimeConfig};
use crate::fetch::{BatchOrchestrator, RetryingFetcher, SlidingWindowLimiter};
use crate::marketplace::SpApiClient;
use crate::{PricingFetcher, PricingOrchestrator};

/// Build the SP-API client from RuntimeConfig
pub(crate) fn init_client(config: &RuntimeConfig) -> Result<Arc<PricingFetcher>> {
    let marketplace = &config.marketplace;
    match marketplace.endpoint.as_deref() {
        Some(endpoint) => info!("Using SP-API endpoint override: {}", endpoint),
        None => info!("Using regional SP-API endpoints"),
    }
    if marketplace.access_token.is_none() {
        warn!("SP-API access token not set; requests will be unauthenticated");
    }

    let client = SpApiClient::new(
        marketplace.endpoint.as_deref(),
        marketplace.access_token.clone(),
        config.batch.request_timeout(),
    )?;
    Ok(Arc::new(client))
}

/// Wire a fetcher into the shared limiter, retry policy and worker pool.
pub fn build_orchestrator(
    config: &RuntimeConfig,
    fetcher: Arc<PricingFetcher>,
) -> Result<PricingOrchestrator> {
    let limiter = SlidingWindowLimiter::new(config.rate_limit.max_calls, config.rate_limit.window())
        .context("Invalid rate limit configuration")?;
    info!(
        "Rate limit: {} calls per {:.1}s",
        limiter.max_calls(),
        limiter.window().as_secs_f64()
    );

    let policy = config.retry.policy();
    info!(
        "Retry policy: {} attempts, backoff base {}",
        policy.max_retries, policy.delay_base
    );

    let retrying = RetryingFetcher::new(fetcher, Arc::new(limiter), policy);
    let options = config.batch.options();
    info!(
        "Batch limits: max_batch_size={} max_workers={} timeout={:.1}s",
        options.max_batch_size,
        options.max_workers,
        options.item_timeout.as_secs_f64()
    );

    BatchOrchestrator::new(retrying, options).context("Invalid batch configuration")
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let Some(server) = config.server.as_ref() else {
        eprintln!("ERROR: server config required for tracing initialization");
        return;
    };

    // RUST_LOG wins over the configured level when present
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match server.log_format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
