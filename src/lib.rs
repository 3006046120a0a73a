//! Feed ingestion for a search index.
//!
//! Entries are fetched from RSS/Atom sources, keyed by identifier and
//! scheduled as identifier-only queue messages. Consumers, possibly in other
//! processes, resolve each message back to its entry and build a normalized
//! [`IndexDocument`](document::IndexDocument) for the index store.

pub mod config;
pub mod document;
pub mod feed;
pub mod index;
pub mod pipeline;
pub mod storage;
pub mod util;
