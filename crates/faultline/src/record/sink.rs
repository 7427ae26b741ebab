//! Fault sinks: where structured records go.
//!
//! The sink is the persistence boundary - this subsystem defines the shape
//! of the call, not the storage behind it.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use super::{FaultRecord, Severity};
use crate::record::module_path_from_file;
use crate::FaultlineError;

/// The flattened entry handed to a sink, one per recorded fault.
#[derive(Debug, Clone, Serialize)]
pub struct SinkEntry {
    /// "frontend" or "backend".
    pub source: &'static str,
    /// Severity name.
    pub level: &'static str,
    /// Kind code or raw type name.
    pub error_type: String,
    /// Fault message.
    pub message: String,
    /// Associated HTTP status.
    pub status_code: u16,
    /// Stack text.
    pub stack_trace: String,
    /// Architectural layer.
    pub layer: String,
    /// Dotted module derived from the origin file path.
    pub module: Option<String>,
    /// Origin function.
    pub function: Option<String>,
    /// Origin line.
    pub line_number: Option<u32>,
    /// Origin file path as recorded.
    pub file_path: Option<String>,
    /// Distributed trace id.
    pub trace_id: Option<String>,
    /// Request id.
    pub request_id: Option<String>,
    /// Acting user id.
    pub user_id: Option<String>,
    /// HTTP method.
    pub request_method: Option<String>,
    /// Request path.
    pub request_path: Option<String>,
    /// Client IP.
    pub ip_address: Option<String>,
    /// Remaining merged context.
    pub context_data: Map<String, Value>,
}

impl SinkEntry {
    /// Flatten a record into the sink wire shape.
    #[must_use]
    pub fn from_record(record: &FaultRecord) -> Self {
        let context = &record.context;
        let string_field = |key: &str| {
            context
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
        };
        Self {
            source: record.source.as_str(),
            level: record.severity.as_str(),
            error_type: record.error_type.clone(),
            message: record.message.clone(),
            status_code: record.http_status,
            stack_trace: record.stack_trace.clone(),
            layer: record.layer.clone(),
            module: record.file_path.as_deref().map(module_path_from_file),
            function: record.function_name.clone(),
            line_number: record.line_number,
            file_path: record.file_path.clone(),
            trace_id: record.trace_id.clone(),
            request_id: record.request_id.clone(),
            user_id: record.user_id.clone(),
            request_method: string_field("request_method"),
            request_path: string_field("request_path"),
            ip_address: string_field("ip_address"),
            context_data: record.context.clone(),
        }
    }
}

/// Destination for recorded faults.
///
/// Implementations must not panic; the recorder treats any `Err` as a
/// sink-side problem to be logged, never propagated.
pub trait FaultSink: Send + Sync {
    /// Deliver one entry.
    fn emit(&self, entry: &SinkEntry) -> Result<(), FaultlineError>;
}

/// Production default: one structured tracing event per fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Create a tracing sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FaultSink for TracingSink {
    fn emit(&self, entry: &SinkEntry) -> Result<(), FaultlineError> {
        let context =
            serde_json::to_string(&entry.context_data).unwrap_or_else(|_| "{}".to_owned());
        match entry.level {
            "CRITICAL" | "ERROR" => error!(
                target: "faultline::sink",
                source = entry.source,
                level = entry.level,
                error_type = %entry.error_type,
                message = %entry.message,
                status_code = entry.status_code,
                layer = %entry.layer,
                module = entry.module.as_deref(),
                function = entry.function.as_deref(),
                line_number = entry.line_number,
                file_path = entry.file_path.as_deref(),
                trace_id = entry.trace_id.as_deref(),
                request_id = entry.request_id.as_deref(),
                user_id = entry.user_id.as_deref(),
                request_method = entry.request_method.as_deref(),
                request_path = entry.request_path.as_deref(),
                ip_address = entry.ip_address.as_deref(),
                context = %context,
                "fault recorded"
            ),
            "WARNING" => warn!(
                target: "faultline::sink",
                source = entry.source,
                error_type = %entry.error_type,
                message = %entry.message,
                layer = %entry.layer,
                trace_id = entry.trace_id.as_deref(),
                context = %context,
                "fault recorded"
            ),
            _ => info!(
                target: "faultline::sink",
                source = entry.source,
                error_type = %entry.error_type,
                message = %entry.message,
                layer = %entry.layer,
                trace_id = entry.trace_id.as_deref(),
                context = %context,
                "fault recorded"
            ),
        }
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<SinkEntry>>,
    fail: Mutex<bool>,
}

impl MemorySink {
    /// Create an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured entries so far.
    #[must_use]
    pub fn entries(&self) -> Vec<SinkEntry> {
        self.entries.lock().clone()
    }

    /// Number of captured entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make subsequent emits fail, for exercising the swallow path.
    pub fn fail_next(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

impl FaultSink for MemorySink {
    fn emit(&self, entry: &SinkEntry) -> Result<(), FaultlineError> {
        if *self.fail.lock() {
            return Err(FaultlineError::Sink("memory sink set to fail".to_owned()));
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}
