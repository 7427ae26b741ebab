//! Remote fault ingestion.
//!
//! Normalises heterogeneous remote fault payloads into the canonical
//! intake shape and records each item independently, with partial-failure
//! batch semantics.

mod convert;
mod http;

pub use convert::{convert_item, IngestPayload, RemoteFault};
pub use http::{fault_router, fault_router_with_limit, IngestResponse, IngestState};
