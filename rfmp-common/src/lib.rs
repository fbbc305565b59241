//! # RFMP Common Library
//!
//! Shared code for the RFMP services:
//! - rfmp-sh (Scan Host): card reader, mapping lookup, play dispatch
//! - rfmp-ph (Playback Host): player process supervision
//!
//! Contains the wire types exchanged between the two hosts, the shared
//! session/event enums, and bootstrap configuration loading.

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{PlayerEvent, SessionState, StopReason};
