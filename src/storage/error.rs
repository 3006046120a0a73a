use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another process holds the database lock
    #[error("entry store is locked by another process")]
    Locked,

    #[error("entry store migration failed: {0}")]
    Migration(String),

    /// A stored entry could not be encoded or decoded
    #[error("entry payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("entry store error: {0}")]
    Other(#[source] sqlx::Error),
}

impl StoreError {
    /// Maps SQLite lock errors to [`StoreError::Locked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return StoreError::Locked;
        }

        StoreError::Other(err)
    }
}
