//! REST API for the scan host
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET | /health | liveness |
//! | POST | /scan | run a card through the resolver and dispatch client |
//! | GET | /pending | unassigned cards seen by the reader |
//! | DELETE | /pending/:card_id | drop a card from the pending list |

pub mod handlers;
pub mod server;

pub use server::{build_router, run, AppContext};
