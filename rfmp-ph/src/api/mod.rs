//! REST API for the playback host
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET | /health | liveness, player binary and music root checks |
//! | GET | /status | QueryStatus |
//! | POST | /play | RequestPlay |
//! | POST | /stop | stop the current session |
//! | GET | /events | SSE stream of player events |

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
