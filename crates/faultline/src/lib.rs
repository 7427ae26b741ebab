//! Faultline - exception handling and monitoring service.
//!
//! This crate captures application failures end to end:
//! - A nine-kind fault taxonomy with canonical codes and HTTP statuses
//! - A classifier that maps raw (untyped) failures onto the taxonomy
//! - A layer rule engine checking which kinds each code layer may raise
//! - A recorder producing one persistent-shaped record per fault
//! - An in-process monitor with hour buckets and threshold alerts
//! - An HTTP boundary ingesting remote (frontend) fault batches
//!
//! ## Architecture
//!
//! ```text
//! typed fault / raw failure → Classifier → Recorder → FaultSink
//! remote batch  → HTTP ingest ↗               ↓
//!                                          Monitor → AlertSink
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod hooks;
pub mod ingest;
pub mod layers;
pub mod monitor;
pub mod record;
pub mod service;
pub mod taxonomy;

pub use config::FaultlineConfig;
pub use error::FaultlineError;
pub use service::FaultService;
pub use taxonomy::{AppFault, FaultKind};
