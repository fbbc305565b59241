//! Wire types shared by the scan host and the playback host
//!
//! The scan host's dispatch client and the playback host's HTTP API both
//! build on these definitions, so the two sides cannot drift apart.

pub mod types;

pub use types::{ErrorKind, ErrorResponse, PlayCommand, PlayOutcome, PlayResponse, StatusResponse};
