//! Framework failure hooks.
//!
//! One handler per fault family - typed, request-validation, HTTP-status,
//! and generic/unhandled. Each records the fault exactly once and returns
//! the uniform JSON envelope:
//!
//! ```json
//! {"error": {..fault..}, "trace_id": "...", "request_id": "..."}
//! ```
//!
//! with the HTTP status taken from the (possibly reclassified) fault.
//! Stack traces stay server-side; the envelope never carries them.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::classify::{CaughtFault, RawFault};
use crate::record::{FaultContext, FaultSource};
use crate::service::FaultService;
use crate::taxonomy::{AppFault, FaultKind, KindDetails};

/// Header carrying the distributed trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Header carrying the request id; one is generated when absent.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the acting user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Per-request metadata extracted from request parts.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    /// Trace id from the request, when present.
    pub trace_id: Option<String>,
    /// Request id from the request, or a generated UUID v4.
    pub request_id: String,
    /// User id from the request, when present.
    pub user_id: Option<String>,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Client IP from `x-forwarded-for`, when present.
    pub ip_address: Option<String>,
}

impl RequestMeta {
    /// Build metadata from request parts.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        let header = |name: &str| header_value(&parts.headers, name);
        Self {
            trace_id: header(TRACE_ID_HEADER),
            request_id: header(REQUEST_ID_HEADER)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: header(USER_ID_HEADER),
            method: parts.method.to_string(),
            path: parts.uri.path().to_owned(),
            ip_address: header("x-forwarded-for")
                .map(|v| v.split(',').next().unwrap_or(&v).trim().to_owned()),
        }
    }

    /// Fault context for recording under this request.
    #[must_use]
    pub fn fault_context(&self) -> FaultContext {
        let mut context = FaultContext::new()
            .with_request_id(self.request_id.clone())
            .with_request(self.method.clone(), self.path.clone());
        context.trace_id = self.trace_id.clone();
        context.user_id = self.user_id.clone();
        context.ip_address = self.ip_address.clone();
        context
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// Records failures and renders the uniform error envelope.
#[derive(Clone)]
pub struct FailureHandler {
    service: Arc<FaultService>,
}

impl FailureHandler {
    /// Create a handler recording through `service`.
    #[must_use]
    pub fn new(service: Arc<FaultService>) -> Self {
        Self { service }
    }

    /// Typed fault raised by application code.
    ///
    /// A strict-mode layer rejection leaves the fault unrecorded but still
    /// enveloped: the client response never depends on the guard.
    #[must_use]
    pub fn handle_typed(&self, fault: AppFault, meta: &RequestMeta) -> Response {
        let context = meta.fault_context();
        if let Err(e) = self.service.record_fault(
            &CaughtFault::Typed(fault.clone()),
            &context,
            FaultSource::Backend,
        ) {
            warn!(error = %e, error_type = fault.error_code(), "fault not recorded");
        }
        envelope(&fault, meta)
    }

    /// Request-body or parameter validation failure.
    #[must_use]
    pub fn handle_validation(&self, detail: impl Into<String>, meta: &RequestMeta) -> Response {
        let detail = detail.into();
        let fault = AppFault::new(FaultKind::Validation, "request validation failed")
            .with_details(KindDetails::Validation {
                field_errors: Value::String(detail),
            });
        self.handle_typed(fault, meta)
    }

    /// Plain HTTP-status failure (framework-level 404s, method mismatches).
    #[must_use]
    pub fn handle_status(
        &self,
        status: StatusCode,
        message: impl Into<String>,
        meta: &RequestMeta,
    ) -> Response {
        let fault = AppFault::new(kind_for_status(status), message);
        self.handle_typed(fault, meta)
    }

    /// Anything uncaught: reclassify once, then record exactly once.
    #[must_use]
    pub fn handle_unhandled(&self, raw: RawFault, meta: &RequestMeta) -> Response {
        let fault = self.service.classify(CaughtFault::Raw(raw));
        self.handle_typed(fault, meta)
    }
}

/// Map a framework HTTP status onto the taxonomy.
#[must_use]
pub fn kind_for_status(status: StatusCode) -> FaultKind {
    match status.as_u16() {
        400 | 422 => FaultKind::Validation,
        401 => FaultKind::Authentication,
        403 => FaultKind::Authorization,
        404 | 405 => FaultKind::NotFound,
        409 => FaultKind::Conflict,
        429 => FaultKind::RateLimit,
        502 | 504 => FaultKind::ExternalService,
        _ => FaultKind::Internal,
    }
}

/// Render the uniform envelope for a fault.
#[must_use]
pub fn envelope(fault: &AppFault, meta: &RequestMeta) -> Response {
    let body = json!({
        "error": fault.to_json(),
        "trace_id": meta.trace_id,
        "request_id": meta.request_id,
    });
    (fault.http_status(), Json(body)).into_response()
}
