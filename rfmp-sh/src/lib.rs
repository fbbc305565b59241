//! # RFMP Scan Host Library (rfmp-sh)
//!
//! Runs next to the card reader. Captures scans, resolves them against the
//! mapping store and dispatches play commands to the playback host.
//!
//! **Architecture:** a capture task feeds a bounded [`HandoffQueue`] drained
//! by the [`Pipeline`] worker (resolver, then dispatch client); a small axum
//! API allows manual scans and exposes unassigned cards.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handoff;
pub mod input;
pub mod pipeline;
pub mod resolver;
pub mod store;

pub use dispatch::{DispatchClient, DispatchOutcome};
pub use error::{Error, Result};
pub use handoff::HandoffQueue;
pub use input::{ScanCapture, ScanEvent};
pub use pipeline::{Pipeline, ScanOutcome, ScanReport};
pub use resolver::{MappingResolver, Resolution};
pub use store::{CardMapping, MappingStore, SqliteMappingStore};
