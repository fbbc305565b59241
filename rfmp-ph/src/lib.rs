//! # RFMP Playback Host Library (rfmp-ph)
//!
//! Runs on the machine with the speakers. Receives play commands from the
//! scan host and supervises the single external player process.
//!
//! **Architecture:** axum HTTP API in front of a [`PlaybackSupervisor`] that
//! owns the player child process; state changes are broadcast as
//! [`PlayerEvent`](rfmp_common::PlayerEvent)s over SSE.

pub mod api;
pub mod config;
pub mod error;
pub mod supervisor;

pub use error::{Error, Result, SupervisorError};
pub use supervisor::{PlayRequest, PlaybackSupervisor};
