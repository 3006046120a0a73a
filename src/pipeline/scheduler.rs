use thiserror::Error;

use super::cache::{fetch_keyed, EntryCache, KeyedFetch, MissingIdentifierError};
use super::queue::{MessageQueue, QueueError, QueueMessage};
use crate::feed::{FeedSource, FetchError};
use crate::storage::{EntryStore, StoreError};

/// Default number of entries taken per scheduling pass.
pub const DEFAULT_LIMIT: usize = 50;

/// Immutable settings for a [`Scheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum entries per pass; 0 takes everything the source publishes.
    pub limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Outcome of one scheduling pass.
#[derive(Debug, Default)]
pub struct ScheduleReport {
    /// Messages enqueued, one per distinct identifier.
    pub scheduled: usize,
    /// Entries left out because they had no identifier.
    pub rejected: Vec<MissingIdentifierError>,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The fetch failed; nothing was enqueued.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Entries could not be written to the shared store; nothing was enqueued.
    #[error("failed to persist fetched entries: {0}")]
    Store(#[from] StoreError),

    /// The queue refused a message part way through the pass.
    #[error("queue rejected message {enqueued} of {total}: {source}")]
    Queue {
        enqueued: usize,
        total: usize,
        #[source]
        source: QueueError,
    },
}

/// Producer stage: fetch, key, enqueue one identifier-only message per entry.
///
/// Scheduling never waits on document building. The cache from the latest
/// successful pass stays available through [`Scheduler::cache`] for
/// consumers running in the same process.
pub struct Scheduler {
    source: FeedSource,
    config: PipelineConfig,
    cache: EntryCache,
    store: Option<EntryStore>,
}

impl Scheduler {
    pub fn new(source: FeedSource, config: PipelineConfig) -> Self {
        Self {
            source,
            config,
            cache: EntryCache::new(),
            store: None,
        }
    }

    /// Also persist every keyed entry to `store` before enqueueing.
    pub fn with_store(mut self, store: EntryStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut FeedSource {
        &mut self.source
    }

    /// Cache from the latest successful pass.
    pub fn cache(&self) -> &EntryCache {
        &self.cache
    }

    pub fn into_cache(self) -> EntryCache {
        self.cache
    }

    /// Runs one scheduling pass.
    ///
    /// Messages are enqueued in source order. If the fetch (or the store
    /// write) fails, no message is enqueued and the previous cache is kept.
    pub async fn schedule_all<Q: MessageQueue>(
        &mut self,
        queue: &Q,
    ) -> Result<ScheduleReport, ScheduleError> {
        let KeyedFetch { cache, rejected } = fetch_keyed(&mut self.source, self.config.limit).await?;

        for missing in &rejected {
            tracing::warn!(
                position = missing.position,
                title = ?missing.title,
                link = ?missing.link,
                "Entry has no identifier, not scheduled"
            );
        }

        if let Some(store) = &self.store {
            let stored = store.put_all(cache.iter()).await?;
            tracing::debug!(stored = stored, "Persisted entries to shared store");
        }

        let messages: Vec<QueueMessage> = cache.ids().map(QueueMessage::new).collect();
        self.cache = cache;

        let total = messages.len();
        for (enqueued, message) in messages.into_iter().enumerate() {
            queue
                .enqueue(message)
                .await
                .map_err(|source| ScheduleError::Queue {
                    enqueued,
                    total,
                    source,
                })?;
        }

        tracing::info!(
            scheduled = total,
            rejected = rejected.len(),
            limit = self.config.limit,
            "Scheduling pass complete"
        );

        Ok(ScheduleReport {
            scheduled: total,
            rejected,
        })
    }
}
