use std::sync::Arc;

use super::cache::EntryCache;
use super::queue::QueueMessage;
use crate::feed::RawEntry;
use crate::storage::EntryStore;

/// Result of looking a message up.
///
/// `Unavailable` is an expected outcome, not an error: a consumer that never
/// ran the fetch which produced the message has nothing to find it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<E> {
    Found(E),
    /// The identifier is not known here. Carries the identifier.
    Unavailable(String),
}

impl<E> Resolution<E> {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn found(self) -> Option<E> {
        match self {
            Resolution::Found(entry) => Some(entry),
            Resolution::Unavailable(_) => None,
        }
    }
}

impl EntryCache {
    /// Resolves a message against this process's cache.
    ///
    /// Lookups have no side effects, so resolving the same message twice
    /// (at-least-once delivery) is harmless.
    pub fn resolve(&self, message: &QueueMessage) -> Resolution<&RawEntry> {
        let id = message.entry_id();
        match self.get(id) {
            Some(entry) => Resolution::Found(entry),
            None => Resolution::Unavailable(id.to_string()),
        }
    }
}

/// Where a consumer looks entries up.
#[derive(Clone)]
pub enum Resolver {
    /// The cache of the fetch that ran in this process.
    Local(Arc<EntryCache>),
    /// The shared store written by a producer process.
    Shared(EntryStore),
}

impl Resolver {
    /// A resolver with nothing in it: every message is unavailable.
    pub fn empty() -> Self {
        Resolver::Local(Arc::new(EntryCache::new()))
    }

    pub async fn resolve(&self, message: &QueueMessage) -> Resolution<RawEntry> {
        match self {
            Resolver::Local(cache) => match cache.resolve(message) {
                Resolution::Found(entry) => Resolution::Found(entry.clone()),
                Resolution::Unavailable(id) => Resolution::Unavailable(id),
            },
            Resolver::Shared(store) => {
                let id = message.entry_id();
                match store.get(id).await {
                    Ok(Some(entry)) => Resolution::Found(entry),
                    Ok(None) => Resolution::Unavailable(id.to_string()),
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "Entry store lookup failed, treating as unavailable");
                        Resolution::Unavailable(id.to_string())
                    }
                }
            }
        }
    }
}
