//! Scan Capture & Debounce
//!
//! Turns the reader's keystrokes into [`ScanEvent`]s: characters are
//! assembled into card ids ([`assembler`]), repeats are suppressed per card
//! ([`debounce`]), and the capture task ([`capture`]) hands accepted events
//! to the pipeline through the [`HandoffQueue`](crate::handoff::HandoffQueue).

pub mod assembler;
pub mod capture;
pub mod debounce;
pub mod device;

use crate::config::ScanConfig;
use assembler::ScanAssembler;
use chrono::{DateTime, Utc};
use debounce::Debouncer;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One logical card presentation, after debouncing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEvent {
    pub card_id: String,
    pub observed_at: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(card_id: impl Into<String>) -> Self {
        Self {
            card_id: card_id.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Assembler and debouncer for one character stream
#[derive(Debug)]
pub struct ScanCapture {
    assembler: ScanAssembler,
    debouncer: Debouncer,
}

impl ScanCapture {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            assembler: ScanAssembler::new(
                config.inactivity(),
                config.min_card_len,
                config.max_card_len,
            ),
            debouncer: Debouncer::new(config.cooldown()),
        }
    }

    /// Feed one character; returns a ScanEvent when a scan is complete and
    /// not a repeat
    pub fn feed(&mut self, ch: char, now: Instant) -> Option<ScanEvent> {
        match self.assembler.push(ch, now)? {
            Ok(card_id) => {
                if self.debouncer.accept(&card_id, now) {
                    info!(card_id = %card_id, "Card scanned");
                    Some(ScanEvent::new(card_id))
                } else {
                    debug!(card_id = %card_id, "Duplicate scan within cooldown suppressed");
                    None
                }
            }
            Err(e) => {
                warn!("Dropping malformed scan: {}", e);
                None
            }
        }
    }

    /// Discard a stale partial buffer
    pub fn expire(&mut self, now: Instant) {
        self.assembler.expire(now);
    }

    /// When the current partial buffer goes stale
    pub fn deadline(&self) -> Option<Instant> {
        self.assembler.deadline()
    }
}
