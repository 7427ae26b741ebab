//! Fault recording.
//!
//! Turns caught failures into immutable [`FaultRecord`]s and forwards each
//! one to the configured [`FaultSink`]. Recording is best-effort: a sink
//! failure is logged separately and never surfaces to the caller, so the
//! original fault's propagation is never masked.

mod context;
mod recorder;
mod sink;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub use context::FaultContext;
pub use recorder::{module_path_from_file, severity_for, DirectFault, Recorder};
pub use sink::{FaultSink, MemorySink, SinkEntry, TracingSink};

/// Where a fault was reported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultSource {
    /// Reported by a remote (browser/mobile) client.
    Frontend,
    /// Caught in this backend.
    Backend,
}

impl FaultSource {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
        }
    }
}

/// Coarse urgency of a recorded fault.
///
/// The capture pipeline only ever produces `Critical` (infrastructure
/// kinds) or `Error` (everything else); `Warning` and `Info` exist for
/// direct reports that carry their own severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Infrastructure failure; feeds the critical alert threshold.
    Critical,
    /// Any other captured fault.
    Error,
    /// Advisory; never produced by the capture path.
    Warning,
    /// Informational; never produced by the capture path.
    Info,
}

impl Severity {
    /// Uppercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

/// The durable representation of one captured fault.
///
/// Created exactly once per fault by the [`Recorder`] and immutable
/// thereafter in this subsystem. The resolution fields exist for the
/// downstream triage workflow and are never mutated here.
#[derive(Debug, Clone, Serialize)]
pub struct FaultRecord {
    /// Record identifier (UUID v4).
    pub id: String,
    /// Frontend or backend.
    pub source: FaultSource,
    /// Severity assigned by the recording policy.
    pub severity: Severity,
    /// Architectural layer the fault originated from.
    pub layer: String,
    /// Fault message.
    pub message: String,
    /// Kind code for typed faults, raw type name otherwise.
    pub error_type: String,
    /// Origin file path.
    pub file_path: Option<String>,
    /// Origin line number.
    pub line_number: Option<u32>,
    /// Origin function name, when known.
    pub function_name: Option<String>,
    /// Distributed trace id, when the request carried one.
    pub trace_id: Option<String>,
    /// Request id, when the request carried one.
    pub request_id: Option<String>,
    /// Acting user id, when known.
    pub user_id: Option<String>,
    /// Stack text; never empty (synthesized as a last resort).
    pub stack_trace: String,
    /// Merged context map.
    pub context: Map<String, Value>,
    /// HTTP status associated with the fault.
    pub http_status: u16,
    /// Triage flag, owned by the downstream workflow.
    pub resolved: bool,
    /// Triage notes, owned by the downstream workflow.
    pub resolution_notes: Option<String>,
    /// Capture timestamp (UTC).
    pub created_at: DateTime<Utc>,
}
