use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    QueryBuilder, SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::error::StoreError;
use crate::feed::RawEntry;

/// Rows per INSERT; 3 columns * 100 stays under SQLite's 999 parameter limit.
const BATCH_SIZE: usize = 100;

/// How long a write waits for a concurrent writer before failing with SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable entry store shared by producer and consumer processes.
///
/// Stands in for the in-memory entry cache when scheduling and document
/// building run in different processes: the producer writes every keyed
/// entry here before enqueueing, consumers look messages up by identifier.
#[derive(Clone)]
pub struct EntryStore {
    pool: SqlitePool,
}

impl EntryStore {
    /// Open (or create) the store at `path` and run migrations.
    ///
    /// `":memory:"` opens a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Locked` if another process holds the database
    /// lock, `StoreError::Migration` if the schema cannot be created.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        Self::open_with_busy_timeout(path, BUSY_TIMEOUT).await
    }

    pub(crate) async fn open_with_busy_timeout(
        path: &str,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Writes wait up to busy_timeout for a concurrent writer (another
        // scheduler pass) before giving up with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StoreError::from_sqlx)?
            .pragma("busy_timeout", busy_timeout.as_millis().to_string());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StoreError::from_sqlx)?;

        let store = Self { pool };
        store.migrate().await.map_err(|e| match StoreError::from_sqlx(e) {
            StoreError::Locked => StoreError::Locked,
            other => StoreError::Migration(other.to_string()),
        })?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY NOT NULL,
                payload TEXT NOT NULL,
                stored_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Stores entries keyed by identifier in a single transaction.
    ///
    /// An identifier that is already stored is overwritten, so the latest
    /// scheduling pass wins. Either every entry is stored or none is.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Locked` if another writer still holds the
    /// database after the busy timeout.
    pub async fn put_all<'a, I>(&self, entries: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a RawEntry)>,
    {
        // Encode up front so a serialization failure never leaves a half-written batch
        let rows = entries
            .into_iter()
            .map(|(id, entry)| serde_json::to_string(entry).map(|payload| (id, payload)))
            .collect::<Result<Vec<(&str, String)>, serde_json::Error>>()?;

        if rows.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        for chunk in rows.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT INTO entries (id, payload, stored_at) ");
            builder.push_values(chunk, |mut b, (id, payload)| {
                b.push_bind(*id).push_bind(payload.as_str()).push_bind(now);
            });
            builder.push(
                " ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, stored_at = excluded.stored_at",
            );
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from_sqlx)?;
        }

        tx.commit().await.map_err(StoreError::from_sqlx)?;
        Ok(rows.len())
    }

    /// Looks an entry up by identifier.
    pub async fn get(&self, id: &str) -> Result<Option<RawEntry>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT payload FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        match row {
            Some((payload,)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(count)
    }
}
