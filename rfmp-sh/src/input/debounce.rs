//! Per-card cooldown

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Entries beyond this count trigger pruning of expired cooldowns
const PRUNE_THRESHOLD: usize = 64;

/// Suppresses repeats of a card id within the cooldown window
///
/// The window is measured from the last *accepted* scan of that id, so a
/// card held on the reader does not extend its own cooldown.
#[derive(Debug)]
pub struct Debouncer {
    cooldown: Duration,
    last_accepted: HashMap<String, Instant>,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: HashMap::new(),
        }
    }

    /// True if the scan should be emitted
    pub fn accept(&mut self, card_id: &str, now: Instant) -> bool {
        if let Some(&last) = self.last_accepted.get(card_id) {
            if now.saturating_duration_since(last) < self.cooldown {
                return false;
            }
        }

        if self.last_accepted.len() >= PRUNE_THRESHOLD {
            let cooldown = self.cooldown;
            self.last_accepted
                .retain(|_, at| now.saturating_duration_since(*at) < cooldown);
        }
        self.last_accepted.insert(card_id.to_string(), now);
        true
    }
}
