//! The canonical fault taxonomy.
//!
//! Nine fault kinds, each with a fixed HTTP status and machine code, plus
//! the typed [`AppFault`] that application code raises. Kind-specific data
//! (validation field errors, missing-resource identity, rate-limit hints)
//! lives in the [`KindDetails`] union rather than in per-kind subtypes, so
//! status and serialization logic stay exhaustive matches.

mod fault;
mod kind;

pub use fault::{fault_from_code, AppFault, CauseSummary, KindDetails, Origin};
pub use kind::FaultKind;
