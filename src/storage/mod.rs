//! Durable entry store (SQLite) for deployments where scheduling and
//! document building run in separate processes.

mod error;
mod store;

pub use error::StoreError;
pub use store::EntryStore;
