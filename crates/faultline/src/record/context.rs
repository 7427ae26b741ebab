//! Transient per-fault context supplied by the catch site.

use serde_json::{Map, Value};

/// Request and caller context attached to a fault at recording time.
///
/// Every field is optional; explicit fields always override whatever the
/// recorder would otherwise derive from the fault itself.
#[derive(Debug, Clone, Default)]
pub struct FaultContext {
    /// Distributed trace id.
    pub trace_id: Option<String>,
    /// Request id.
    pub request_id: Option<String>,
    /// Acting user id.
    pub user_id: Option<String>,
    /// HTTP method of the failing request.
    pub request_method: Option<String>,
    /// Path of the failing request.
    pub request_path: Option<String>,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Origin file override.
    pub file_path: Option<String>,
    /// Origin line override.
    pub line_number: Option<u32>,
    /// Origin function override.
    pub function_name: Option<String>,
    /// Stack text override (used for remote reports).
    pub stack_trace: Option<String>,
    /// Additional context entries, merged after the fault's own context.
    pub extra: Map<String, Value>,
}

impl FaultContext {
    /// Empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Set the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the request method and path.
    #[must_use]
    pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.request_method = Some(method.into());
        self.request_path = Some(path.into());
        self
    }

    /// Override the origin location.
    #[must_use]
    pub fn with_location(
        mut self,
        file: impl Into<String>,
        line: Option<u32>,
        function: Option<String>,
    ) -> Self {
        self.file_path = Some(file.into());
        self.line_number = line;
        self.function_name = function;
        self
    }

    /// Supply stack text (remote reports have no local backtrace).
    #[must_use]
    pub fn with_stack_trace(mut self, stack: impl Into<String>) -> Self {
        self.stack_trace = Some(stack.into());
        self
    }

    /// Add an extra context entry.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
