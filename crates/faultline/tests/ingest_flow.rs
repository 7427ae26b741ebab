//! Integration tests for the fault capture pipeline.
//!
//! Tests the full flow: caught failure -> classify -> record -> monitor,
//! and the HTTP boundary: remote batch -> ingest -> stats.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use rstest::{fixture, rstest};
use serde_json::{json, Value};
use tower::ServiceExt;

use faultline::classify::{CaughtFault, RawFault};
use faultline::config::{Environment, FaultlineConfig, LayerConfig};
use faultline::hooks::FailureHandler;
use faultline::ingest::{fault_router, IngestState};
use faultline::layers::LayerRuleEngine;
use faultline::monitor::MemoryAlerts;
use faultline::record::{FaultContext, FaultSource, MemorySink, Severity};
use faultline::taxonomy::{AppFault, FaultKind, Origin};
use faultline::FaultService;

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    service: Arc<FaultService>,
    sink: Arc<MemorySink>,
    alerts: Arc<MemoryAlerts>,
}

#[fixture]
fn harness() -> Harness {
    let sink = Arc::new(MemorySink::new());
    let alerts = Arc::new(MemoryAlerts::new());
    let mut config = FaultlineConfig::default();
    config.environment = Environment::Development;
    let service = Arc::new(FaultService::from_config(
        &config,
        sink.clone(),
        alerts.clone(),
    ));
    Harness {
        service,
        sink,
        alerts,
    }
}

#[fixture]
fn router(harness: Harness) -> (Router, Harness) {
    let state = IngestState::new(harness.service.clone());
    (fault_router(state), harness)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Classification through the service
// ============================================================================

#[rstest]
fn raw_value_error_in_module_code_records_as_validation(harness: Harness) {
    let raw = RawFault::new("ValueError", "invalid report format");
    let context = FaultContext::new().with_location(
        "/app/portal/modules/report/service.py",
        Some(88),
        Some("build_report".to_owned()),
    );
    let record = harness
        .service
        .record_fault(&CaughtFault::Raw(raw), &context, FaultSource::Backend)
        .unwrap();

    assert_eq!(record.error_type, "ValueError");
    assert_eq!(record.layer, "module");
    assert_eq!(record.severity, Severity::Error);

    // The classifier agrees independently.
    let typed = harness
        .service
        .classify(CaughtFault::Raw(RawFault::new("ValueError", "invalid report format")));
    assert_eq!(typed.kind(), FaultKind::Validation);
}

#[rstest]
#[case("OperationalError", "connection pool exhausted", FaultKind::Database)]
#[case("TimeoutError", "upstream timeout", FaultKind::ExternalService)]
#[case("PermissionError", "forbidden resource", FaultKind::Authorization)]
#[case("SomethingNovel", "no keywords at all", FaultKind::Internal)]
fn raw_failures_classify_by_precedence(
    harness: Harness,
    #[case] type_name: &str,
    #[case] message: &str,
    #[case] expected: FaultKind,
) {
    let typed = harness
        .service
        .classify(CaughtFault::Raw(RawFault::new(type_name, message)));
    assert_eq!(typed.kind(), expected);
}

// ============================================================================
// Alert threshold boundary
// ============================================================================

#[rstest]
fn nine_criticals_no_alert_tenth_fires_one(harness: Harness) {
    for _ in 0..9 {
        let fault = AppFault::new(FaultKind::Database, "pool exhausted");
        harness
            .service
            .record_fault(
                &CaughtFault::Typed(fault),
                &FaultContext::new(),
                FaultSource::Backend,
            )
            .unwrap();
    }
    assert!(harness.alerts.is_empty());

    let fault = AppFault::new(FaultKind::Database, "pool exhausted");
    harness
        .service
        .record_fault(
            &CaughtFault::Typed(fault),
            &FaultContext::new(),
            FaultSource::Backend,
        )
        .unwrap();
    assert_eq!(harness.alerts.len(), 1);

    let alert = &harness.alerts.fired()[0];
    assert_eq!(alert.count, 10);
    assert_eq!(alert.threshold, 10);
    assert_eq!(alert.severity, Severity::Critical);
}

#[rstest]
fn stats_window_is_zero_filled(harness: Harness) {
    let fault = AppFault::new(FaultKind::Validation, "bad input");
    harness
        .service
        .record_fault(
            &CaughtFault::Typed(fault),
            &FaultContext::new(),
            FaultSource::Backend,
        )
        .unwrap();

    let stats = harness.service.stats(6);
    assert_eq!(stats.by_hour.len(), 6);
    assert_eq!(stats.total_count, 1);
    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.critical_count, 0);
    assert_eq!(stats.by_type["ValidationError"], 1);
}

// ============================================================================
// Layer enforcement
// ============================================================================

#[rstest]
fn strict_layers_reject_disallowed_kind() {
    let config = LayerConfig {
        enabled: Some(true),
        strict: true,
        rules: Vec::new(),
    };
    let engine = LayerRuleEngine::new(&config, Environment::Development);

    let allowed = AppFault::new(FaultKind::Validation, "bad field")
        .with_origin(Origin::new("portal/api/members.rs", 10, None));
    assert!(engine.admit(allowed).is_ok());

    let violating = AppFault::new(FaultKind::Database, "leaked to the edge")
        .with_origin(Origin::new("portal/api/members.rs", 11, None));
    assert!(engine.admit(violating).is_err());
}

// ============================================================================
// HTTP boundary
// ============================================================================

#[rstest]
#[tokio::test]
async fn remote_batch_partial_then_stats(router: (Router, Harness)) {
    let (router, harness) = router;

    let body = json!({"exceptions": [
        {"error": {"name": "TypeError", "message": "x is undefined",
                   "stack": "TypeError: x is undefined\n  at app.js:10"}},
        {"error": {"name": "ValueError", "message": "invalid email format"}},
        {"this item": "has no message"}
    ]});
    let response = router
        .clone()
        .oneshot(post_json("/v1/faults", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let out = body_json(response).await;
    assert_eq!(out["status"], "partial");
    assert_eq!(out["processed"], 2);
    assert_eq!(out["failed"], 1);

    // Every recorded item is a frontend fault with a classified type.
    assert_eq!(harness.sink.len(), 2);
    for entry in harness.sink.entries() {
        assert_eq!(entry.source, "frontend");
    }

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/faults/stats?hours=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let stats = body_json(response).await;
    assert_eq!(stats["total_count"], 2);
    assert_eq!(stats["by_type"]["ValueError"], 1);
    assert_eq!(stats["by_type"]["TypeError"], 1);
}

#[rstest]
#[tokio::test]
async fn threshold_update_applies_to_subsequent_faults(router: (Router, Harness)) {
    let (router, harness) = router;

    let request = Request::builder()
        .method("PUT")
        .uri("/v1/faults/thresholds")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"critical": 2}).to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for _ in 0..2 {
        let fault = AppFault::new(FaultKind::Internal, "panic equivalent");
        harness
            .service
            .record_fault(
                &CaughtFault::Typed(fault),
                &FaultContext::new(),
                FaultSource::Backend,
            )
            .unwrap();
    }
    assert_eq!(harness.alerts.len(), 1);
    assert_eq!(harness.alerts.fired()[0].threshold, 2);
}

// ============================================================================
// Failure hooks
// ============================================================================

#[rstest]
#[tokio::test]
async fn unhandled_failure_gets_envelope_and_single_record(harness: Harness) {
    let handler = FailureHandler::new(harness.service.clone());
    let request = Request::builder()
        .method("POST")
        .uri("/v1/reports")
        .header("x-trace-id", "trace-9")
        .body(())
        .unwrap();
    let (parts, ()) = request.into_parts();
    let meta = faultline::hooks::RequestMeta::from_parts(&parts);

    let raw = RawFault::new("ConnectionError", "connection refused by redis");
    let response = handler.handle_unhandled(raw, &meta);
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "ExternalServiceError");
    assert_eq!(body["trace_id"], "trace-9");
    assert!(body["error"].get("stack_trace").is_none());

    // Recorded exactly once, and the monitor saw it.
    assert_eq!(harness.sink.len(), 1);
    assert_eq!(harness.service.stats(1).critical_count, 1);
}
