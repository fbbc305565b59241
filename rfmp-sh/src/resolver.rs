//! Mapping Resolver: scan event → mapped / unmapped / store unavailable
//!
//! Every scan queries the store; nothing is cached, so an assignment made
//! between two scans of the same card takes effect on the second scan.

use crate::store::{CardMapping, MappingStore};
use tracing::{debug, error, info};

/// Outcome of resolving a card id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Mapped(CardMapping),
    /// Routed to the assignment workflow; not an error
    Unmapped,
    /// The store could not be queried; retryable on the next scan
    StoreUnavailable(String),
}

impl Resolution {
    /// Short machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Mapped(_) => "mapped",
            Resolution::Unmapped => "unmapped",
            Resolution::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

/// Resolves card ids against a [`MappingStore`]
#[derive(Clone)]
pub struct MappingResolver<S> {
    store: S,
}

impl<S: MappingStore> MappingResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn resolve(&self, card_id: &str) -> Resolution {
        match self.store.lookup(card_id).await {
            Ok(Some(mapping)) => {
                debug!(card_id, directory = %mapping.directory, "Card mapped");
                Resolution::Mapped(mapping)
            }
            Ok(None) => {
                info!(card_id, "Card not assigned");
                Resolution::Unmapped
            }
            Err(e) => {
                error!(card_id, "Mapping lookup failed: {}", e);
                Resolution::StoreUnavailable(e.to_string())
            }
        }
    }
}
