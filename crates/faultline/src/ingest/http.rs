//! axum HTTP ingestion and stats API.
//!
//! Gzip-compressed request bodies are automatically decompressed via
//! tower-http middleware.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::debug;

use super::convert::convert_item;
use crate::config::{DEFAULT_MAX_BODY_SIZE, DEFAULT_STATS_HOURS};
use crate::hooks::{FailureHandler, RequestMeta};
use crate::ingest::IngestPayload;
use crate::record::FaultSource;
use crate::service::FaultService;

/// Longest stats window a caller may request (one week of buckets).
pub const MAX_STATS_HOURS: u32 = 168;

/// Shared state for the ingestion API.
#[derive(Clone)]
pub struct IngestState {
    /// The fault service records through this.
    pub service: Arc<FaultService>,
    /// Renders and records API-level failures.
    pub failures: FailureHandler,
}

impl IngestState {
    /// Build the state around a service.
    #[must_use]
    pub fn new(service: Arc<FaultService>) -> Self {
        Self {
            failures: FailureHandler::new(service.clone()),
            service,
        }
    }
}

/// Create the ingestion router with the default body size limit.
pub fn fault_router(state: IngestState) -> Router {
    fault_router_with_limit(state, DEFAULT_MAX_BODY_SIZE)
}

/// Create the ingestion router with a custom body size limit.
pub fn fault_router_with_limit(state: IngestState, max_body_size: usize) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/v1/faults", post(handle_ingest))
        .route("/v1/faults/stats", get(handle_stats))
        .route("/v1/faults/thresholds", put(handle_thresholds))
        .fallback(handle_fallback)
        .layer(RequestDecompressionLayer::new())
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}

/// Handle GET /health - ingestion health check.
#[tracing::instrument]
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Unknown routes get the uniform envelope, recorded like any other fault.
async fn handle_fallback(State(state): State<IngestState>, meta: RequestMeta) -> Response {
    state
        .failures
        .handle_status(StatusCode::NOT_FOUND, "route not found", &meta)
}

/// Batch ingestion response.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// "completed" when every item recorded, "partial" otherwise.
    pub status: &'static str,
    /// Items recorded.
    pub processed: usize,
    /// Items that failed conversion.
    pub failed: usize,
    /// One reason per failed item, or null when none failed.
    pub errors: Option<Vec<String>>,
}

/// Handle POST /v1/faults - record a batch (or single) remote report.
///
/// Items are converted and recorded independently: a bad item is counted
/// and reported in the response instead of aborting the rest.
#[tracing::instrument(skip(state, payload))]
async fn handle_ingest(
    State(state): State<IngestState>,
    meta: RequestMeta,
    payload: Result<Json<IngestPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return state.failures.handle_validation(rejection.body_text(), &meta),
    };

    let batch_user_agent = payload.user_agent.clone();
    let batch_metadata = payload.metadata.clone();
    let batch_timestamp = payload.timestamp.clone();
    let items = payload.items();
    let mut processed = 0usize;
    let mut errors = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match convert_item(item) {
            Ok(mut fault) => {
                if fault.user_agent.is_none() {
                    fault.user_agent.clone_from(&batch_user_agent);
                }
                let (direct, mut context) = fault.into_parts();
                if context.trace_id.is_none() {
                    context.trace_id.clone_from(&meta.trace_id);
                }
                if context.request_id.is_none() {
                    context.request_id = Some(meta.request_id.clone());
                }
                if context.user_id.is_none() {
                    context.user_id.clone_from(&meta.user_id);
                }
                context.ip_address.clone_from(&meta.ip_address);
                // Batch-level fields apply to every item; an item's own
                // entries win.
                if let Some(metadata) = &batch_metadata {
                    context
                        .extra
                        .entry("metadata".to_owned())
                        .or_insert_with(|| metadata.clone());
                }
                if let Some(timestamp) = &batch_timestamp {
                    context
                        .extra
                        .entry("timestamp".to_owned())
                        .or_insert_with(|| Value::String(timestamp.clone()));
                }
                let _ = state.service.report(direct, &context, FaultSource::Frontend);
                processed += 1;
            }
            Err(e) => {
                debug!(index, error = %e, "dropping malformed fault report item");
                errors.push(format!("item {index}: {e}"));
            }
        }
    }

    let failed = errors.len();
    let response = IngestResponse {
        status: if failed == 0 { "completed" } else { "partial" },
        processed,
        failed,
        errors: if errors.is_empty() { None } else { Some(errors) },
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Query parameters for GET /v1/faults/stats.
#[derive(Debug, Default, Deserialize)]
struct StatsQuery {
    /// Trailing window in hours (default 24, capped at one week).
    hours: Option<u32>,
}

/// Handle GET /v1/faults/stats.
#[tracing::instrument(skip(state))]
async fn handle_stats(
    State(state): State<IngestState>,
    Query(query): Query<StatsQuery>,
) -> Response {
    let hours = query
        .hours
        .unwrap_or(DEFAULT_STATS_HOURS)
        .clamp(1, MAX_STATS_HOURS);
    Json(state.service.stats(hours)).into_response()
}

/// Body for PUT /v1/faults/thresholds.
#[derive(Debug, Deserialize)]
struct ThresholdUpdate {
    critical: Option<u64>,
    error: Option<u64>,
}

/// Current thresholds, returned after an update.
#[derive(Debug, Serialize)]
struct ThresholdResponse {
    critical_threshold: u64,
    error_threshold: u64,
}

/// Handle PUT /v1/faults/thresholds - runtime threshold adjustment.
#[tracing::instrument(skip(state, payload))]
async fn handle_thresholds(
    State(state): State<IngestState>,
    meta: RequestMeta,
    payload: Result<Json<ThresholdUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return state.failures.handle_validation(rejection.body_text(), &meta),
    };
    state
        .service
        .set_alert_thresholds(update.critical, update.error);
    let (critical_threshold, error_threshold) = state.service.alert_thresholds();
    Json(ThresholdResponse {
        critical_threshold,
        error_threshold,
    })
    .into_response()
}
