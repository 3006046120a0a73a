use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

/// Minimal queue payload: the body is the entry identifier and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueMessage {
    pub body: String,
}

impl QueueMessage {
    pub fn new(entry_id: impl Into<String>) -> Self {
        Self {
            body: entry_id.into(),
        }
    }

    /// The identifier this message refers to.
    pub fn entry_id(&self) -> &str {
        self.body.trim()
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport was opened without the side this call needs.
    #[error("queue is not open for {0}")]
    NotOpen(&'static str),
}

/// Queue transport between the scheduling and building stages.
///
/// Delivery is assumed at-least-once with no ordering guarantee across
/// consumers. `dequeue` returns `None` once the queue is drained.
pub trait MessageQueue: Send + Sync {
    fn enqueue(&self, message: QueueMessage) -> impl Future<Output = Result<(), QueueError>> + Send;

    fn dequeue(&self) -> impl Future<Output = Result<Option<QueueMessage>, QueueError>> + Send;
}

/// FIFO queue shared by in-process producers and consumers.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    messages: Mutex<VecDeque<QueueMessage>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    /// Copies of the pending messages, front first.
    pub async fn pending(&self) -> Vec<QueueMessage> {
        self.messages.lock().await.iter().cloned().collect()
    }
}

impl MessageQueue for InMemoryQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), QueueError> {
        self.messages.lock().await.push_back(message);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueueMessage>, QueueError> {
        Ok(self.messages.lock().await.pop_front())
    }
}

type LineReader = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;
type LineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Newline-delimited JSON transport, one message per line.
///
/// Lets the two stages run as separate processes joined by a pipe or a file:
/// the producer opens it with [`JsonLinesQueue::writer`], the consumer with
/// [`JsonLinesQueue::reader`].
pub struct JsonLinesQueue {
    reader: Option<Mutex<LineReader>>,
    writer: Option<Mutex<LineWriter>>,
}

impl JsonLinesQueue {
    pub fn reader(input: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let input: Box<dyn AsyncRead + Send + Unpin> = Box::new(input);
        Self {
            reader: Some(Mutex::new(BufReader::new(input).lines())),
            writer: None,
        }
    }

    pub fn writer(output: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            reader: None,
            writer: Some(Mutex::new(Box::new(output))),
        }
    }
}

impl MessageQueue for JsonLinesQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), QueueError> {
        let writer = self.writer.as_ref().ok_or(QueueError::NotOpen("writing"))?;
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');

        let mut writer = writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueueMessage>, QueueError> {
        let reader = self.reader.as_ref().ok_or(QueueError::NotOpen("reading"))?;
        let mut lines = reader.lock().await;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<QueueMessage>(line) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => {
                    tracing::warn!(line = %line, error = %e, "Skipping malformed queue message");
                }
            }
        }

        Ok(None)
    }
}
