//! The recording pipeline.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::error;
use uuid::Uuid;

use super::{FaultContext, FaultRecord, FaultSink, FaultSource, Severity, SinkEntry};
use crate::classify::CaughtFault;
use crate::layers::{LayerRuleEngine, UNMATCHED_LAYER};
use crate::taxonomy::FaultKind;

/// Deployment path prefixes stripped when deriving a module path.
const DEPLOY_PREFIXES: &[&str] = &["/app/", "/srv/", "/usr/src/app/"];

/// Source file extensions stripped when deriving a module path.
const SOURCE_EXTENSIONS: &[&str] = &[".rs", ".py", ".ts", ".tsx", ".js"];

/// Builds immutable fault records and forwards them to the sink.
pub struct Recorder {
    sink: Arc<dyn FaultSink>,
    layers: Arc<LayerRuleEngine>,
}

impl Recorder {
    /// Create a recorder writing to `sink`, resolving layers via `layers`.
    #[must_use]
    pub fn new(sink: Arc<dyn FaultSink>, layers: Arc<LayerRuleEngine>) -> Self {
        Self { sink, layers }
    }

    /// Record a caught failure.
    ///
    /// Derivation rules:
    /// - `error_type`: the typed fault's kind code, else the raw type name.
    /// - severity: critical for infrastructure kinds, error otherwise.
    /// - stack text: the fault's captured backtrace, else context-supplied
    ///   stack, else a synthesized `Type: message` line - never empty.
    /// - location: the fault's origin; context overrides always win.
    #[must_use]
    pub fn record(
        &self,
        fault: &CaughtFault,
        context: &FaultContext,
        source: FaultSource,
    ) -> FaultRecord {
        let (error_type, message, kind, own_context, cause, origin, backtrace, raw_stack) =
            match fault {
                CaughtFault::Typed(typed) => (
                    typed.kind().code().to_owned(),
                    typed.message().to_owned(),
                    Some(typed.kind()),
                    typed.context().clone(),
                    typed.cause().cloned(),
                    Some(typed.origin().clone()),
                    typed.backtrace().map(str::to_owned),
                    None,
                ),
                CaughtFault::Raw(raw) => (
                    raw.type_name.clone(),
                    raw.message.clone(),
                    None,
                    Map::new(),
                    None,
                    None,
                    None,
                    raw.stack.clone(),
                ),
            };

        let severity = kind.map_or(Severity::Error, severity_for);
        let http_status = kind.map_or(500, |k| k.http_status().as_u16());

        let stack_trace = backtrace
            .or(raw_stack)
            .or_else(|| context.stack_trace.clone())
            .unwrap_or_else(|| format!("{error_type}: {message}"));

        let file_path = context
            .file_path
            .clone()
            .or_else(|| origin.as_ref().map(|o| o.file.clone()));
        let line_number = context
            .line_number
            .or_else(|| origin.as_ref().map(|o| o.line));
        let function_name = context
            .function_name
            .clone()
            .or_else(|| origin.as_ref().and_then(|o| o.function.clone()));

        let layer = file_path
            .as_deref()
            .map_or_else(|| UNMATCHED_LAYER.to_owned(), |p| self.layers.layer_name(p));

        let mut merged = own_context;
        merge_context(&mut merged, context);
        if let Some(cause) = cause {
            merged.insert("original_type".to_owned(), Value::String(cause.type_name));
            merged.insert("original_message".to_owned(), Value::String(cause.message));
        }

        let record = FaultRecord {
            id: Uuid::new_v4().to_string(),
            source,
            severity,
            layer,
            message,
            error_type,
            file_path,
            line_number,
            function_name,
            trace_id: context.trace_id.clone(),
            request_id: context.request_id.clone(),
            user_id: context.user_id.clone(),
            stack_trace,
            context: merged,
            http_status,
            resolved: false,
            resolution_notes: None,
            created_at: Utc::now(),
        };
        self.forward(&record);
        record
    }

    /// Record a pre-formed report: the same pipeline, but every derived
    /// field may be supplied explicitly. Used for remote reports that carry
    /// no local backtrace.
    #[must_use]
    pub fn record_direct(
        &self,
        direct: DirectFault,
        context: &FaultContext,
        source: FaultSource,
    ) -> FaultRecord {
        let error_type = direct
            .error_code
            .clone()
            .unwrap_or_else(|| direct.type_name.clone());
        let http_status = direct
            .status_code
            .or_else(|| direct.kind.map(|k| k.http_status().as_u16()))
            .unwrap_or(500);
        let severity = direct
            .severity
            .or_else(|| direct.kind.map(severity_for))
            .unwrap_or(Severity::Error);
        let stack_trace = direct
            .stack_trace
            .or_else(|| context.stack_trace.clone())
            .unwrap_or_else(|| format!("{}: {}", direct.type_name, direct.message));

        let layer = context
            .file_path
            .as_deref()
            .map_or_else(|| UNMATCHED_LAYER.to_owned(), |p| self.layers.layer_name(p));

        let mut merged = direct.detail;
        merge_context(&mut merged, context);

        let record = FaultRecord {
            id: Uuid::new_v4().to_string(),
            source,
            severity,
            layer,
            message: direct.message,
            error_type,
            file_path: context.file_path.clone(),
            line_number: context.line_number,
            function_name: context.function_name.clone(),
            trace_id: context.trace_id.clone(),
            request_id: context.request_id.clone(),
            user_id: context.user_id.clone(),
            stack_trace,
            context: merged,
            http_status,
            resolved: false,
            resolution_notes: None,
            created_at: Utc::now(),
        };
        self.forward(&record);
        record
    }

    /// Forward one record to the sink.
    ///
    /// Sink failures are logged and swallowed: recording must never raise
    /// and must never shadow the original fault.
    fn forward(&self, record: &FaultRecord) {
        let entry = SinkEntry::from_record(record);
        if let Err(e) = self.sink.emit(&entry) {
            error!(
                error = %e,
                record_id = %record.id,
                error_type = %record.error_type,
                "failed to forward fault record to sink"
            );
        }
    }
}

/// A pre-formed fault report for [`Recorder::record_direct`].
#[derive(Debug, Clone, Default)]
pub struct DirectFault {
    /// Reported type name.
    pub type_name: String,
    /// Reported message.
    pub message: String,
    /// Classified kind, when one was assigned.
    pub kind: Option<FaultKind>,
    /// Explicit error code override.
    pub error_code: Option<String>,
    /// Explicit HTTP status override.
    pub status_code: Option<u16>,
    /// Explicit severity override.
    pub severity: Option<Severity>,
    /// Reported stack text.
    pub stack_trace: Option<String>,
    /// Extra detail map merged into the record context.
    pub detail: Map<String, Value>,
}

/// Severity policy: critical for infrastructure kinds, error otherwise.
///
/// Warning/Info exist in the taxonomy but are never assigned here.
#[must_use]
pub const fn severity_for(kind: FaultKind) -> Severity {
    if kind.is_infrastructure() {
        Severity::Critical
    } else {
        Severity::Error
    }
}

/// Merge request fields and extras into a record context map.
fn merge_context(merged: &mut Map<String, Value>, context: &FaultContext) {
    for (key, value) in &context.extra {
        merged.insert(key.clone(), value.clone());
    }
    let mut put = |key: &str, value: &Option<String>| {
        if let Some(v) = value {
            merged.insert(key.to_owned(), Value::String(v.clone()));
        }
    };
    put("request_method", &context.request_method);
    put("request_path", &context.request_path);
    put("ip_address", &context.ip_address);
}

/// Normalise a source file path to a canonical dotted module form.
///
/// Strips deployment prefixes, any leading path up to a `src/` segment,
/// and the source extension, so the same module yields the same name
/// across differing deployment layouts.
#[must_use]
pub fn module_path_from_file(path: &str) -> String {
    let mut p = path.replace('\\', "/");
    for prefix in DEPLOY_PREFIXES {
        if let Some(rest) = p.strip_prefix(prefix) {
            p = rest.to_owned();
            break;
        }
    }
    let mut p = p.trim_start_matches("./").to_owned();
    if let Some(idx) = p.rfind("src/") {
        p = p[idx + 4..].to_owned();
    }
    for ext in SOURCE_EXTENSIONS {
        if let Some(stripped) = p.strip_suffix(ext) {
            p = stripped.to_owned();
            break;
        }
    }
    p.trim_matches('/').replace('/', ".")
}
