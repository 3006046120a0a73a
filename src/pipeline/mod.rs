//! The fetch → key → schedule → resolve → build pipeline.
//!
//! - [`cache`] - entry cache and the fetch-and-key step
//! - [`scheduler`] - producer stage, one identifier-only message per entry
//! - [`queue`] - queue transport boundary and two transports
//! - [`resolver`] - recovers the entry a message refers to
//! - [`worker`] - consumer stage, resolve + build + submit
//!
//! Per message: `Fetched → Cached → Scheduled → {Resolved → Built} | Unresolvable`.
//! The only state the two stages share is the queue, plus either the
//! in-process cache or the shared [`EntryStore`](crate::storage::EntryStore).

pub mod cache;
pub mod queue;
pub mod resolver;
pub mod scheduler;
pub mod worker;

pub use cache::{fetch_keyed, key_entries, EntryCache, KeyedFetch, MissingIdentifierError};
pub use queue::{InMemoryQueue, JsonLinesQueue, MessageQueue, QueueError, QueueMessage};
pub use resolver::{Resolution, Resolver};
pub use scheduler::{PipelineConfig, ScheduleError, ScheduleReport, Scheduler, DEFAULT_LIMIT};
pub use worker::{drain, process_message, DrainReport, MessageOutcome};
