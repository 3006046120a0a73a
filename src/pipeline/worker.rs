use futures::future;

use super::queue::{MessageQueue, QueueError, QueueMessage};
use super::resolver::{Resolution, Resolver};
use crate::document::build;
use crate::index::IndexSink;

/// Terminal state of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Document built and accepted by the index.
    Built { id: String },
    /// The identifier could not be resolved here; skipped.
    Unresolvable { id: String },
    /// Document built but the index refused it.
    IndexFailed { id: String, error: String },
}

/// Tally of a drain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub built: usize,
    pub unresolvable: Vec<String>,
    pub index_failures: Vec<(String, String)>,
    /// Documents built without a `date` because the entry's date was unparseable.
    pub malformed_dates: usize,
}

impl DrainReport {
    pub fn processed(&self) -> usize {
        self.built + self.unresolvable.len() + self.index_failures.len()
    }

    fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Built { .. } => self.built += 1,
            MessageOutcome::Unresolvable { id } => self.unresolvable.push(id),
            MessageOutcome::IndexFailed { id, error } => self.index_failures.push((id, error)),
        }
    }

    fn merge(&mut self, other: DrainReport) {
        self.built += other.built;
        self.unresolvable.extend(other.unresolvable);
        self.index_failures.extend(other.index_failures);
        self.malformed_dates += other.malformed_dates;
    }
}

/// Resolves, builds and submits one message.
///
/// Returns the outcome plus whether the entry's date had to be dropped.
/// Never fails: every per-entry problem becomes an outcome.
pub async fn process_message<I: IndexSink>(
    message: &QueueMessage,
    resolver: &Resolver,
    sink: &I,
) -> (MessageOutcome, bool) {
    let entry = match resolver.resolve(message).await {
        Resolution::Found(entry) => entry,
        Resolution::Unavailable(id) => {
            tracing::info!(id = %id, "Entry not available to this worker, skipping");
            return (MessageOutcome::Unresolvable { id }, false);
        }
    };

    let id = message.entry_id().to_string();
    let built = build(entry.feed(), &entry);
    let malformed_date = match &built.date_error {
        Some(e) => {
            tracing::warn!(id = %id, error = %e, "Publication date dropped from document");
            true
        }
        None => false,
    };

    let outcome = match sink.submit(built.document).await {
        Ok(()) => MessageOutcome::Built { id },
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Index store refused document");
            MessageOutcome::IndexFailed {
                id,
                error: e.to_string(),
            }
        }
    };
    (outcome, malformed_date)
}

async fn consume<Q, I>(
    worker: usize,
    queue: &Q,
    resolver: &Resolver,
    sink: &I,
) -> Result<DrainReport, QueueError>
where
    Q: MessageQueue,
    I: IndexSink,
{
    let mut report = DrainReport::default();
    while let Some(message) = queue.dequeue().await? {
        let (outcome, malformed_date) = process_message(&message, resolver, sink).await;
        if malformed_date {
            report.malformed_dates += 1;
        }
        report.record(outcome);
    }
    tracing::debug!(worker = worker, processed = report.processed(), "Consumer drained queue");
    Ok(report)
}

/// Drains `queue` with `workers` concurrent consumers.
///
/// Stops when the queue reports empty. Only a queue failure aborts the
/// drain; unresolvable entries and index refusals are counted in the report.
pub async fn drain<Q, I>(
    queue: &Q,
    resolver: &Resolver,
    sink: &I,
    workers: usize,
) -> Result<DrainReport, QueueError>
where
    Q: MessageQueue,
    I: IndexSink,
{
    let consumers = (0..workers.max(1)).map(|worker| consume(worker, queue, resolver, sink));
    let reports = future::try_join_all(consumers).await?;

    let mut total = DrainReport::default();
    for report in reports {
        total.merge(report);
    }

    tracing::info!(
        built = total.built,
        unresolvable = total.unresolvable.len(),
        index_failures = total.index_failures.len(),
        malformed_dates = total.malformed_dates,
        "Drain complete"
    );
    Ok(total)
}
