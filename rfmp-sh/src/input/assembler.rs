//! Character stream → candidate card ids
//!
//! Pure state machine; the caller supplies the clock so the inactivity rule
//! can be tested without sleeping.

use crate::error::InputMalformed;
use std::time::{Duration, Instant};
use tracing::warn;

/// Closes the current buffer
pub fn is_terminator(ch: char) -> bool {
    ch == '\n' || ch == '\r'
}

/// Accumulates characters until a terminator
#[derive(Debug)]
pub struct ScanAssembler {
    buffer: String,
    /// Characters received past `max_len` and not stored
    overflow: usize,
    last_input: Option<Instant>,
    inactivity: Duration,
    min_len: usize,
    max_len: usize,
}

impl ScanAssembler {
    pub fn new(inactivity: Duration, min_len: usize, max_len: usize) -> Self {
        Self {
            buffer: String::new(),
            overflow: 0,
            last_input: None,
            inactivity,
            min_len: min_len.max(1),
            max_len,
        }
    }

    /// Feed one character
    ///
    /// Returns `Some` when a terminator closes a non-empty buffer: the card id,
    /// or why the buffer was malformed. A stale partial buffer is discarded
    /// before `ch` is handled.
    pub fn push(&mut self, ch: char, now: Instant) -> Option<Result<String, InputMalformed>> {
        self.expire(now);

        if is_terminator(ch) {
            return self.close();
        }

        if self.buffer.len() < self.max_len.saturating_add(1) {
            self.buffer.push(ch);
        } else {
            self.overflow += 1;
        }
        self.last_input = Some(now);
        None
    }

    /// Discard a partial buffer idle for at least the inactivity window
    ///
    /// Returns the discarded contents.
    pub fn expire(&mut self, now: Instant) -> Option<String> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }

        let partial = std::mem::take(&mut self.buffer);
        self.reset();
        warn!(
            partial = %partial,
            "Discarding partial scan after {} ms without a terminator",
            self.inactivity.as_millis()
        );
        Some(partial)
    }

    /// When the current partial buffer goes stale; None if the buffer is empty
    pub fn deadline(&self) -> Option<Instant> {
        if self.buffer.is_empty() && self.overflow == 0 {
            return None;
        }
        self.last_input.map(|at| at + self.inactivity)
    }

    fn close(&mut self) -> Option<Result<String, InputMalformed>> {
        let raw = std::mem::take(&mut self.buffer);
        let overflow = self.overflow;
        self.reset();

        let candidate = raw.trim();
        if candidate.is_empty() && overflow == 0 {
            // Bare terminator, e.g. the second half of "\r\n"
            return None;
        }

        let len = candidate.chars().count() + overflow;
        if len > self.max_len {
            return Some(Err(InputMalformed::TooLong {
                len,
                max: self.max_len,
            }));
        }
        if let Some(bad) = candidate.chars().find(|c| !c.is_ascii_digit()) {
            return Some(Err(InputMalformed::NonDigit(bad)));
        }
        if len < self.min_len {
            return Some(Err(InputMalformed::TooShort {
                len,
                min: self.min_len,
            }));
        }

        Some(Ok(candidate.to_string()))
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.overflow = 0;
        self.last_input = None;
    }
}
