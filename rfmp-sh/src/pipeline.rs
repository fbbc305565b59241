//! Pipeline worker: drains the hand-off queue, resolving and dispatching
//! one scan at a time
//!
//! Unmapped cards are recorded in [`PendingAssignments`] for the assignment
//! workflow to pick up.

use crate::dispatch::{DispatchClient, DispatchOutcome};
use crate::handoff::HandoffQueue;
use crate::input::ScanEvent;
use crate::resolver::{MappingResolver, Resolution};
use crate::store::MappingStore;
use chrono::{DateTime, Utc};
use rfmp_common::api::PlayCommand;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Maximum number of unassigned cards remembered
pub const PENDING_LIMIT: usize = 16;

/// Resolver outcome category reported for a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Mapped,
    Unmapped,
    StoreUnavailable,
}

/// What happened to one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub card_id: String,
    pub outcome: ScanOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Present only for mapped cards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A card seen by the reader with no assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCard {
    pub card_id: String,
    pub last_seen: DateTime<Utc>,
}

/// Recently scanned unassigned cards, most recent first, without duplicates
#[derive(Clone, Default)]
pub struct PendingAssignments {
    cards: Arc<Mutex<VecDeque<PendingCard>>>,
}

impl PendingAssignments {
    pub fn record(&self, card_id: &str, seen: DateTime<Utc>) {
        let mut cards = self.lock();
        cards.retain(|c| c.card_id != card_id);
        cards.push_front(PendingCard {
            card_id: card_id.to_string(),
            last_seen: seen,
        });
        cards.truncate(PENDING_LIMIT);
    }

    /// Remove a card once it has been assigned; returns whether it was listed
    pub fn remove(&self, card_id: &str) -> bool {
        let mut cards = self.lock();
        let before = cards.len();
        cards.retain(|c| c.card_id != card_id);
        cards.len() != before
    }

    pub fn list(&self) -> Vec<PendingCard> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PendingCard>> {
        self.cards
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resolver + dispatch client, run sequentially per scan
#[derive(Clone)]
pub struct Pipeline<S> {
    resolver: MappingResolver<S>,
    dispatcher: DispatchClient,
    pending: PendingAssignments,
}

impl<S: MappingStore> Pipeline<S> {
    pub fn new(resolver: MappingResolver<S>, dispatcher: DispatchClient) -> Self {
        Self {
            resolver,
            dispatcher,
            pending: PendingAssignments::default(),
        }
    }

    pub fn pending(&self) -> &PendingAssignments {
        &self.pending
    }

    pub fn resolver(&self) -> &MappingResolver<S> {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &DispatchClient {
        &self.dispatcher
    }

    /// Resolve one scan and, if mapped, dispatch it
    pub async fn process(&self, event: &ScanEvent) -> ScanReport {
        let card_id = event.card_id.clone();

        match self.resolver.resolve(&event.card_id).await {
            Resolution::Mapped(mapping) => {
                let command = PlayCommand {
                    card_id: mapping.card_id.clone(),
                    directory: mapping.directory.clone(),
                };
                let dispatch = self.dispatcher.dispatch(&command).await;
                ScanReport {
                    card_id,
                    outcome: ScanOutcome::Mapped,
                    directory: Some(mapping.directory),
                    title: mapping.title,
                    artist: mapping.artist,
                    dispatch: Some(dispatch),
                    error: None,
                }
            }
            Resolution::Unmapped => {
                self.pending.record(&event.card_id, event.observed_at);
                ScanReport {
                    card_id,
                    outcome: ScanOutcome::Unmapped,
                    directory: None,
                    title: None,
                    artist: None,
                    dispatch: None,
                    error: None,
                }
            }
            Resolution::StoreUnavailable(reason) => ScanReport {
                card_id,
                outcome: ScanOutcome::StoreUnavailable,
                directory: None,
                title: None,
                artist: None,
                dispatch: None,
                error: Some(reason),
            },
        }
    }

    /// Drain `queue` until it is closed
    pub async fn run(&self, queue: HandoffQueue<ScanEvent>) {
        info!("Pipeline worker started");
        while let Some(event) = queue.pop().await {
            let report = self.process(&event).await;
            debug!(card_id = %report.card_id, outcome = ?report.outcome, "Scan processed");
        }
        info!("Pipeline worker stopped");
    }
}
