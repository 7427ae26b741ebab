//! Typed application faults.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::Location;

use serde_json::{Map, Value};

use super::FaultKind;

/// Where a fault was constructed.
///
/// Captured via `#[track_caller]` at construction; an explicit origin
/// replaces the stack-frame walking a dynamic runtime would do, and it is
/// what the layer rule engine checks against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Source file path, as the compiler recorded it.
    pub file: String,
    /// Line number within the file.
    pub line: u32,
    /// Function name, when known (explicit origins only).
    pub function: Option<String>,
}

impl Origin {
    /// Capture the immediate caller's location.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file().to_owned(),
            line: location.line(),
            function: None,
        }
    }

    /// Build an explicit origin.
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32, function: Option<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function,
        }
    }
}

/// Summary of a wrapped original cause: its type name and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CauseSummary {
    /// Type name of the original failure.
    pub type_name: String,
    /// Message of the original failure.
    pub message: String,
}

/// Kind-specific payloads.
///
/// One union instead of per-kind subtypes: serialization is a single
/// exhaustive match, and kinds without extra data carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KindDetails {
    /// No kind-specific data.
    #[default]
    None,
    /// Per-field validation failures.
    Validation {
        /// Arbitrary field-error structure as reported by the caller.
        field_errors: Value,
    },
    /// Identity of the missing resource.
    NotFound {
        /// Resource type, e.g. "member" or "project".
        resource_type: Option<String>,
        /// Resource identifier.
        resource_id: Option<String>,
    },
    /// Rate limit hints for the client.
    RateLimit {
        /// Seconds until the caller may retry.
        retry_after: Option<u64>,
        /// Which limit was hit, e.g. "per_user" or "per_ip".
        limit_type: Option<String>,
    },
}

impl KindDetails {
    /// Extra serialized fields for this payload, layered on top of the base
    /// fault object. Keys already present in the base are never overwritten.
    fn extend_json(&self, out: &mut Map<String, Value>) {
        let mut put = |key: &str, value: Value| {
            if !out.contains_key(key) {
                out.insert(key.to_owned(), value);
            }
        };
        match self {
            Self::None => {}
            Self::Validation { field_errors } => {
                put("field_errors", field_errors.clone());
            }
            Self::NotFound {
                resource_type,
                resource_id,
            } => {
                if let Some(rt) = resource_type {
                    put("resource_type", Value::String(rt.clone()));
                }
                if let Some(rid) = resource_id {
                    put("resource_id", Value::String(rid.clone()));
                }
            }
            Self::RateLimit {
                retry_after,
                limit_type,
            } => {
                if let Some(secs) = retry_after {
                    put("retry_after", Value::from(*secs));
                }
                if let Some(lt) = limit_type {
                    put("limit_type", Value::String(lt.clone()));
                }
            }
        }
    }
}

/// A typed application fault.
///
/// The one failure shape the rest of the pipeline understands: a kind, a
/// message, a context map, an optional wrapped cause, and the origin it was
/// raised from. A backtrace is captured at construction when the process
/// has backtraces enabled (`RUST_BACKTRACE`).
#[derive(Debug, Clone)]
pub struct AppFault {
    kind: FaultKind,
    message: String,
    context: Map<String, Value>,
    cause: Option<CauseSummary>,
    error_code: Option<String>,
    details: KindDetails,
    origin: Origin,
    backtrace: Option<String>,
}

impl AppFault {
    /// Create a fault of the given kind, capturing the caller's origin.
    #[must_use]
    #[track_caller]
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Map::new(),
            cause: None,
            error_code: None,
            details: KindDetails::None,
            origin: Origin::caller(),
            backtrace: capture_backtrace(),
        }
    }

    /// Shorthand for a validation fault with field errors.
    #[must_use]
    #[track_caller]
    pub fn validation(message: impl Into<String>, field_errors: Value) -> Self {
        Self::new(FaultKind::Validation, message)
            .with_details(KindDetails::Validation { field_errors })
    }

    /// Shorthand for a not-found fault naming the missing resource.
    #[must_use]
    #[track_caller]
    pub fn not_found(
        message: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self::new(FaultKind::NotFound, message).with_details(KindDetails::NotFound {
            resource_type: Some(resource_type.into()),
            resource_id: Some(resource_id.into()),
        })
    }

    /// Attach a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Attach a summary of the original failure this fault wraps.
    #[must_use]
    pub fn with_cause(mut self, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        self.cause = Some(CauseSummary {
            type_name: type_name.into(),
            message: message.into(),
        });
        self
    }

    /// Override the machine error code (defaults to the kind's code).
    #[must_use]
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Attach kind-specific details.
    #[must_use]
    pub fn with_details(mut self, details: KindDetails) -> Self {
        self.details = details;
        self
    }

    /// Replace the captured origin with an explicit one.
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// The fault's kind.
    #[must_use]
    pub const fn kind(&self) -> FaultKind {
        self.kind
    }

    /// The fault's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine error code: the override if set, else the kind's code.
    #[must_use]
    pub fn error_code(&self) -> &str {
        self.error_code.as_deref().unwrap_or(self.kind.code())
    }

    /// HTTP status for this fault.
    #[must_use]
    pub const fn http_status(&self) -> axum::http::StatusCode {
        self.kind.http_status()
    }

    /// Context map attached to this fault.
    #[must_use]
    pub const fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Summary of the wrapped cause, if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&CauseSummary> {
        self.cause.as_ref()
    }

    /// Kind-specific details.
    #[must_use]
    pub const fn details(&self) -> &KindDetails {
        &self.details
    }

    /// Where the fault was constructed.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Backtrace captured at construction, if the process had them enabled.
    #[must_use]
    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }

    /// Serialize for the client-facing envelope.
    ///
    /// Base fields first (`type`, `code`, `message`, `status_code`,
    /// `context`), then kind-specific extras, which never overwrite base
    /// keys. Stack traces are deliberately not part of this shape.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".to_owned(), Value::String(self.kind.code().to_owned()));
        out.insert(
            "code".to_owned(),
            Value::String(self.error_code().to_owned()),
        );
        out.insert("message".to_owned(), Value::String(self.message.clone()));
        out.insert(
            "status_code".to_owned(),
            Value::from(self.kind.http_status().as_u16()),
        );
        out.insert("context".to_owned(), Value::Object(self.context.clone()));
        self.details.extend_json(&mut out);
        Value::Object(out)
    }
}

impl std::fmt::Display for AppFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for AppFault {}

/// Build a fault from a machine code.
///
/// Unknown codes fall back to [`FaultKind::Internal`]; this factory never
/// fails, so remote reports with unrecognised codes are still captured.
#[must_use]
#[track_caller]
pub fn fault_from_code(code: &str, message: impl Into<String>) -> AppFault {
    let kind = FaultKind::from_code(code).unwrap_or(FaultKind::Internal);
    AppFault::new(kind, message)
}

fn capture_backtrace() -> Option<String> {
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        Some(backtrace.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_defaults_to_kind() {
        let fault = AppFault::new(FaultKind::Conflict, "duplicate member");
        assert_eq!(fault.error_code(), "ConflictError");
        assert_eq!(fault.to_json()["code"], "ConflictError");
    }

    #[test]
    fn code_override_flows_into_json() {
        let fault =
            AppFault::new(FaultKind::Validation, "bad email").with_error_code("EMAIL_FORMAT");
        assert_eq!(fault.error_code(), "EMAIL_FORMAT");
        assert_eq!(fault.to_json()["code"], "EMAIL_FORMAT");
        // The tag stays the kind's code regardless of the override.
        assert_eq!(fault.to_json()["type"], "ValidationError");
    }

    #[test]
    fn details_never_overwrite_base_fields() {
        let fault = AppFault::validation(
            "invalid payload",
            json!([{"field": "email", "reason": "format"}]),
        );
        let out = fault.to_json();
        assert_eq!(out["message"], "invalid payload");
        assert_eq!(out["status_code"], 400);
        assert_eq!(out["field_errors"][0]["field"], "email");
    }

    #[test]
    fn not_found_extras() {
        let fault = AppFault::not_found("project missing", "project", "p-17");
        let out = fault.to_json();
        assert_eq!(out["type"], "NotFoundError");
        assert_eq!(out["resource_type"], "project");
        assert_eq!(out["resource_id"], "p-17");
    }

    #[test]
    fn rate_limit_extras() {
        let fault =
            AppFault::new(FaultKind::RateLimit, "slow down").with_details(KindDetails::RateLimit {
                retry_after: Some(30),
                limit_type: Some("per_user".to_owned()),
            });
        let out = fault.to_json();
        assert_eq!(out["retry_after"], 30);
        assert_eq!(out["limit_type"], "per_user");
    }

    #[test]
    fn origin_is_this_file() {
        let fault = AppFault::new(FaultKind::Internal, "boom");
        assert!(fault.origin().file.ends_with("fault.rs"));
        assert!(fault.origin().line > 0);
    }

    #[test]
    fn unknown_code_falls_back_to_internal() {
        let fault = fault_from_code("MysteryError", "what");
        assert_eq!(fault.kind(), FaultKind::Internal);
        assert_eq!(fault.http_status().as_u16(), 500);
    }

    #[test]
    fn known_code_maps_through() {
        let fault = fault_from_code("RateLimitError", "limit");
        assert_eq!(fault.kind(), FaultKind::RateLimit);
    }

    #[test]
    fn cause_summary_is_kept() {
        let fault = AppFault::new(FaultKind::Database, "insert failed")
            .with_cause("SqlError", "unique constraint");
        let cause = fault.cause().unwrap();
        assert_eq!(cause.type_name, "SqlError");
        assert_eq!(cause.message, "unique constraint");
    }
}
