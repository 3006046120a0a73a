use std::collections::HashMap;
use thiserror::Error;

use crate::feed::{FeedSource, FetchError, RawEntry};

/// An entry came back from the source without a usable identifier.
///
/// The entry is left out of the cache and reported; the rest of the fetch
/// carries on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("entry #{position} has no identifier (title: {title:?}, link: {link:?})")]
pub struct MissingIdentifierError {
    /// Zero-based position of the entry in source order.
    pub position: usize,
    pub title: Option<String>,
    pub link: Option<String>,
}

/// Entries from one fetch, keyed by identifier.
///
/// Each identifier maps to at most one entry. Iteration follows the order
/// in which identifiers were first seen; a later entry with the same
/// identifier replaces the value but keeps that position.
#[derive(Debug, Clone, Default)]
pub struct EntryCache {
    order: Vec<String>,
    entries: HashMap<String, RawEntry>,
}

impl EntryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` under `id`, returning the entry it replaced.
    pub fn insert(&mut self, id: impl Into<String>, entry: RawEntry) -> Option<RawEntry> {
        let id = id.into();
        if !self.entries.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.entries.insert(id, entry)
    }

    pub fn get(&self, id: &str) -> Option<&RawEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Identifiers in first-seen source order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    /// `(id, entry)` pairs in first-seen source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawEntry)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| (id.as_str(), entry)))
    }
}

/// Outcome of keying one fetch.
#[derive(Debug, Default)]
pub struct KeyedFetch {
    pub cache: EntryCache,
    /// Entries left out because they had no identifier.
    pub rejected: Vec<MissingIdentifierError>,
}

/// Keys entries on their identifiers.
pub fn key_entries(entries: Vec<RawEntry>) -> KeyedFetch {
    let mut keyed = KeyedFetch::default();

    for (position, entry) in entries.into_iter().enumerate() {
        let Some(id) = entry.id().map(str::to_owned) else {
            keyed.rejected.push(MissingIdentifierError {
                position,
                title: entry.title().map(str::to_owned),
                link: entry.link().map(str::to_owned),
            });
            continue;
        };

        if keyed.cache.insert(id.as_str(), entry).is_some() {
            tracing::debug!(id = %id, position = position, "Entry republished in the same fetch, keeping the later copy");
        }
    }

    keyed
}

/// Fetches up to `limit` entries from `source` and keys them.
///
/// A fetch failure is returned as-is; there is no partial cache.
pub async fn fetch_keyed(source: &mut FeedSource, limit: usize) -> Result<KeyedFetch, FetchError> {
    let entries = source.fetch(limit).await?;
    Ok(key_entries(entries))
}
