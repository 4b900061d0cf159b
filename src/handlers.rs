// HTTP request handlers for server mode
//
// Implements batch and single-ASIN pricing lookups plus health/config views

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::fetch::{BatchReport, ErrorKind, FetchResult};
use crate::marketplace::{Marketplace, PricingRecord};
use crate::{AppError, AppState};

#[derive(Debug, Deserialize)]
struct BatchRequest {
    asins: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SingleRequest {
    asin: String,
}

/// Wire form of one per-ASIN outcome
#[derive(Debug, Serialize)]
struct ItemBody<'a> {
    asin: &'a str,
    success: bool,
    #[serde(flatten)]
    record: Option<&'a PricingRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl<'a> From<&'a FetchResult<PricingRecord>> for ItemBody<'a> {
    fn from(result: &'a FetchResult<PricingRecord>) -> Self {
        match result {
            FetchResult::Success {
                identifier,
                payload,
            } => ItemBody {
                asin: identifier,
                success: true,
                record: Some(payload),
                error: None,
                error_kind: None,
            },
            FetchResult::Failure {
                identifier,
                kind,
                message,
            } => ItemBody {
                asin: identifier,
                success: false,
                record: None,
                error: Some(message),
                error_kind: Some(*kind),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchResponse<'a> {
    results: Vec<ItemBody<'a>>,
    total_requested: usize,
    successful: usize,
    failed: usize,
    success_rate: String,
}

impl<'a> From<&'a BatchReport<PricingRecord>> for BatchResponse<'a> {
    fn from(report: &'a BatchReport<PricingRecord>) -> Self {
        BatchResponse {
            results: report.results.iter().map(ItemBody::from).collect(),
            total_requested: report.total_requested,
            successful: report.success_count,
            failed: report.failure_count,
            success_rate: report.success_rate_display(),
        }
    }
}

fn parse_marketplace(country: &str) -> Result<Marketplace, AppError> {
    country.parse().map_err(AppError::bad_request)
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(anyhow::anyhow!("Invalid request body: {}", e)))
}

fn item_response(result: &FetchResult<PricingRecord>) -> Response {
    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(ItemBody::from(result))).into_response()
}

/// POST /asin/batch/:country - Batch pricing lookup
pub(crate) async fn batch_by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let marketplace = parse_marketplace(&country)?;
    let request: BatchRequest = parse_body(&body)?;
    debug!(
        marketplace = %marketplace,
        items = request.asins.len(),
        "Received batch request"
    );

    let report = state
        .orchestrator
        .process_batch(request.asins, marketplace)
        .await
        .map_err(|e| AppError::bad_request(e.into()))?;

    Ok((StatusCode::OK, Json(BatchResponse::from(&report))).into_response())
}

/// GET /asin/:asin - Single lookup in the default marketplace
pub(crate) async fn asin_in_default_marketplace(
    State(state): State<AppState>,
    Path(asin): Path<String>,
) -> Result<Response, AppError> {
    counter!("http.single_requests").increment(1);
    let result = state
        .orchestrator
        .fetch_single(&asin, state.default_marketplace)
        .await
        .map_err(|e| AppError::bad_request(e.into()))?;
    Ok(item_response(&result))
}

/// POST /asin/:country - Single lookup with the ASIN in the body
pub(crate) async fn asin_by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let marketplace = parse_marketplace(&country)?;
    let request: SingleRequest = parse_body(&body)?;
    counter!("http.single_requests").increment(1);

    let result = state
        .orchestrator
        .fetch_single(&request.asin, marketplace)
        .await
        .map_err(|e| AppError::bad_request(e.into()))?;
    Ok(item_response(&result))
}

/// GET /health - Liveness plus current rate limit usage
pub(crate) async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let limiter = state.orchestrator.fetcher().limiter();
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "message": "FBA Backend is running",
            "rate_limit": {
                "calls_per_window": limiter.max_calls(),
                "window_seconds": limiter.window().as_secs_f64(),
                "calls_in_window": limiter.calls_in_window(),
            },
        })),
    )
}

/// GET /config - Effective settings, without credentials
pub(crate) async fn config_view(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    (
        StatusCode::OK,
        Json(json!({
            "rate_limiting": {
                "calls_per_window": config.rate_limit.max_calls,
                "window_seconds": config.rate_limit.window_secs,
                "request_timeout": config.batch.request_timeout_secs,
            },
            "batch_processing": {
                "max_batch_size": config.batch.max_batch_size,
                "max_workers": config.batch.max_workers,
            },
            "retry_config": {
                "max_retries": config.retry.max_retries,
                "retry_delay_base": config.retry.delay_base,
            },
            "marketplace": {
                "default_country": state.default_marketplace.country_code(),
                "access_token_configured": config.marketplace.access_token.is_some(),
            },
        })),
    )
}

pub(crate) async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"})))
}
