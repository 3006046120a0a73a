//! Index store boundary: where finished documents are handed off.

use std::future::Future;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::document::IndexDocument;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("index store rejected document: {0}")]
    Rejected(String),
}

/// Receives complete documents. Documents are only ever submitted whole.
pub trait IndexSink: Send + Sync {
    fn submit(&self, document: IndexDocument) -> impl Future<Output = Result<(), IndexError>> + Send;
}

/// Collects documents in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: Mutex<Vec<IndexDocument>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn documents(&self) -> Vec<IndexDocument> {
        self.documents.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}

impl IndexSink for MemoryIndex {
    async fn submit(&self, document: IndexDocument) -> Result<(), IndexError> {
        self.documents.lock().await.push(document);
        Ok(())
    }
}

/// Writes each document as one line of JSON.
pub struct JsonLinesIndex {
    output: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl JsonLinesIndex {
    pub fn new(output: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            output: Mutex::new(Box::new(output)),
        }
    }
}

impl IndexSink for JsonLinesIndex {
    async fn submit(&self, document: IndexDocument) -> Result<(), IndexError> {
        let mut line = serde_json::to_vec(&document)?;
        line.push(b'\n');

        let mut output = self.output.lock().await;
        output.write_all(&line).await?;
        output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FieldKey, FieldValue};

    fn doc(title: &str) -> IndexDocument {
        let mut doc = IndexDocument::default();
        doc.set(FieldKey::Title, FieldValue::Text(title.into()));
        doc.set(FieldKey::SourceLink, FieldValue::Text("https://example.com/".into()));
        doc
    }

    #[tokio::test]
    async fn test_memory_index_keeps_submission_order() {
        let index = MemoryIndex::new();
        index.submit(doc("a")).await.unwrap();
        index.submit(doc("b")).await.unwrap();

        let docs = index.documents().await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get(FieldKey::Title).and_then(FieldValue::as_text), Some("b"));
    }

    #[tokio::test]
    async fn test_json_lines_index_writes_one_line_per_document() {
        let path = std::env::temp_dir().join(format!("feedindex_docs_{}.jsonl", std::process::id()));
        let file = tokio::fs::File::create(&path).await.unwrap();

        let index = JsonLinesIndex::new(file);
        index.submit(doc("a")).await.unwrap();
        index.submit(doc("b")).await.unwrap();
        drop(index);

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            [
                r#"{"source-link":"https://example.com/","title":"a"}"#,
                r#"{"source-link":"https://example.com/","title":"b"}"#
            ]
        );

        std::fs::remove_file(&path).ok();
    }
}
