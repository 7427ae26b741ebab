//! Conversion of remote fault payloads to the canonical intake shape.
//!
//! Remote reporters disagree about envelope shapes. The two we accept:
//!
//! - nested: `{"error": {"name", "message", "stack"}, "context":
//!   {"userAgent", "url", "api": {"method", "url", "trace_id"}}}`
//! - flat: `{"name"|"type"|"error_type", "message", "stack", ...}`
//!
//! Unrecognised extra fields ride along in the context map rather than
//! being dropped.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::record::{DirectFault, FaultContext};
use crate::FaultlineError;

/// The batch (or single) ingestion request body.
#[derive(Debug, Default, Deserialize)]
pub struct IngestPayload {
    /// Batch form.
    pub exceptions: Option<Vec<Value>>,
    /// Single form.
    pub exception: Option<Value>,
    /// Reporter metadata, attached to every item in the batch.
    pub metadata: Option<Value>,
    /// Reporter timestamp, attached to every item in the batch.
    pub timestamp: Option<String>,
    /// Reporter user agent, used when an item carries none of its own.
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
}

impl IngestPayload {
    /// All items in this payload, batch and single forms combined.
    #[must_use]
    pub fn items(self) -> Vec<Value> {
        let mut items = self.exceptions.unwrap_or_default();
        if let Some(single) = self.exception {
            items.push(single);
        }
        items
    }
}

/// One remote fault in canonical intake form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteFault {
    /// Reported type name (defaults to "Error").
    pub type_name: String,
    /// Reported message.
    pub message: String,
    /// Reported stack text.
    pub stack: Option<String>,
    /// Trace id, from the item or its api context.
    pub trace_id: Option<String>,
    /// Request id.
    pub request_id: Option<String>,
    /// Acting user id.
    pub user_id: Option<String>,
    /// Page URL the fault occurred on.
    pub url: Option<String>,
    /// API method associated with the fault.
    pub method: Option<String>,
    /// Reporter user agent.
    pub user_agent: Option<String>,
    /// Everything else worth keeping.
    pub extra: Map<String, Value>,
}

impl RemoteFault {
    /// Split into the recording inputs: the pre-formed fault and the
    /// request context it was reported under.
    #[must_use]
    pub fn into_parts(self) -> (DirectFault, FaultContext) {
        let mut extra = self.extra;
        if let Some(url) = &self.url {
            extra.insert("url".to_owned(), Value::String(url.clone()));
        }
        if let Some(agent) = &self.user_agent {
            extra.insert("user_agent".to_owned(), Value::String(agent.clone()));
        }

        let mut context = FaultContext::new();
        context.trace_id = self.trace_id;
        context.request_id = self.request_id;
        context.user_id = self.user_id;
        context.request_method = self.method;
        context.request_path = self.url;
        context.stack_trace = self.stack.clone();
        context.extra = extra;

        let direct = DirectFault {
            type_name: self.type_name,
            message: self.message,
            stack_trace: self.stack,
            ..Default::default()
        };
        (direct, context)
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Convert one remote item to the canonical intake shape.
///
/// Fails (with a reason suitable for the batch response) when the item is
/// not an object or carries no message anywhere we know to look.
pub fn convert_item(item: &Value) -> Result<RemoteFault, FaultlineError> {
    let obj = item
        .as_object()
        .ok_or_else(|| FaultlineError::InvalidReport("item is not an object".to_owned()))?;

    let error_obj = obj.get("error").and_then(Value::as_object);

    let type_name = error_obj
        .and_then(|e| str_field(e, "name"))
        .or_else(|| str_field(obj, "name"))
        .or_else(|| str_field(obj, "type"))
        .or_else(|| str_field(obj, "error_type"))
        .unwrap_or_else(|| "Error".to_owned());

    let message = error_obj
        .and_then(|e| str_field(e, "message"))
        .or_else(|| str_field(obj, "message"))
        .ok_or_else(|| FaultlineError::InvalidReport("item has no message".to_owned()))?;

    let stack = error_obj
        .and_then(|e| str_field(e, "stack"))
        .or_else(|| str_field(obj, "stack"))
        .or_else(|| str_field(obj, "stack_trace"));

    let context_obj = obj.get("context").and_then(Value::as_object);
    let api_obj = context_obj.and_then(|c| c.get("api")).and_then(Value::as_object);

    let trace_id = api_obj
        .and_then(|a| str_field(a, "trace_id"))
        .or_else(|| str_field(obj, "trace_id"));
    let url = context_obj
        .and_then(|c| str_field(c, "url"))
        .or_else(|| api_obj.and_then(|a| str_field(a, "url")))
        .or_else(|| str_field(obj, "url"));
    let user_agent = context_obj
        .and_then(|c| str_field(c, "userAgent"))
        .or_else(|| str_field(obj, "userAgent"));

    let mut extra = Map::new();
    for (key, value) in obj {
        if !matches!(
            key.as_str(),
            "error"
                | "context"
                | "name"
                | "type"
                | "error_type"
                | "message"
                | "stack"
                | "stack_trace"
                | "trace_id"
                | "request_id"
                | "user_id"
                | "url"
                | "userAgent"
        ) {
            extra.insert(key.clone(), value.clone());
        }
    }

    Ok(RemoteFault {
        type_name,
        message,
        stack,
        trace_id,
        request_id: str_field(obj, "request_id"),
        user_id: str_field(obj, "user_id"),
        url,
        method: api_obj.and_then(|a| str_field(a, "method")),
        user_agent,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_envelope() {
        let item = json!({
            "error": {
                "name": "TypeError",
                "message": "x is undefined",
                "stack": "TypeError: x is undefined\n  at app.js:10"
            },
            "context": {
                "userAgent": "Mozilla/5.0",
                "url": "/reports/monthly",
                "api": {"method": "GET", "url": "/api/v1/reports", "trace_id": "t-55"}
            }
        });
        let fault = convert_item(&item).unwrap();
        assert_eq!(fault.type_name, "TypeError");
        assert_eq!(fault.message, "x is undefined");
        assert!(fault.stack.as_deref().unwrap().contains("app.js"));
        assert_eq!(fault.trace_id.as_deref(), Some("t-55"));
        assert_eq!(fault.method.as_deref(), Some("GET"));
        assert_eq!(fault.url.as_deref(), Some("/reports/monthly"));
        assert_eq!(fault.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn flat_envelope() {
        let item = json!({
            "type": "NetworkError",
            "message": "fetch failed",
            "stack_trace": "NetworkError: fetch failed",
            "trace_id": "t-9",
            "user_id": "u-3",
            "release": "1.4.2"
        });
        let fault = convert_item(&item).unwrap();
        assert_eq!(fault.type_name, "NetworkError");
        assert_eq!(fault.trace_id.as_deref(), Some("t-9"));
        assert_eq!(fault.user_id.as_deref(), Some("u-3"));
        // Unknown fields ride along.
        assert_eq!(fault.extra["release"], "1.4.2");
    }

    #[test]
    fn missing_message_is_rejected() {
        let item = json!({"error": {"name": "Mystery"}});
        assert!(convert_item(&item).is_err());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(convert_item(&json!("just a string")).is_err());
        assert!(convert_item(&json!(42)).is_err());
    }

    #[test]
    fn missing_type_defaults_to_error() {
        let item = json!({"message": "something broke"});
        let fault = convert_item(&item).unwrap();
        assert_eq!(fault.type_name, "Error");
    }

    #[test]
    fn into_parts_threads_fields() {
        let item = json!({
            "error": {"name": "TypeError", "message": "boom", "stack": "TypeError: boom"},
            "context": {"url": "/page", "api": {"method": "POST", "trace_id": "t-1"}}
        });
        let (direct, context) = convert_item(&item).unwrap().into_parts();
        assert_eq!(direct.type_name, "TypeError");
        assert_eq!(direct.stack_trace.as_deref(), Some("TypeError: boom"));
        assert_eq!(context.trace_id.as_deref(), Some("t-1"));
        assert_eq!(context.request_method.as_deref(), Some("POST"));
        assert_eq!(context.extra["url"], "/page");
    }

    #[test]
    fn payload_combines_batch_and_single() {
        let payload: IngestPayload = serde_json::from_value(json!({
            "exceptions": [{"message": "a"}, {"message": "b"}],
            "exception": {"message": "c"}
        }))
        .unwrap();
        assert_eq!(payload.items().len(), 3);
    }
}
