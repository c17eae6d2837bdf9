//! Row-store seam for the subscriber registry.
//!
//! The registry never talks to a database directly; it goes through
//! [`ConnectionStore`] so production can use Postgres while tests inject an
//! in-memory implementation.

use async_trait::async_trait;
use thiserror::Error;

use shared::models::{ConnectionRecord, Identity, RowKey};

pub mod postgres;

pub use postgres::PgConnectionStore;

/// Hard cap on the number of keys a single [`ConnectionStore::delete_batch`]
/// call may carry. Callers chunk larger sets.
pub const MAX_DELETE_BATCH: usize = 25;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No channel index is configured or the index cannot be used; callers
    /// may fall back to a full scan.
    #[error("no channel index is available")]
    IndexUnavailable,

    /// The batch handed to `delete_batch` exceeds [`MAX_DELETE_BATCH`].
    #[error("delete batch of {0} exceeds the {MAX_DELETE_BATCH}-item limit")]
    BatchTooLarge(usize),

    /// The metadata row for a connection is missing.
    #[error("connection {0} has no metadata row")]
    MissingConnection(String),

    /// The backend failed (connectivity, SQL, serialization).
    #[error("registry backend: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.into())
    }
}

/// Persistent mapping from connections to channels, plus per-connection
/// metadata. All operations are row-scoped and idempotent where the contract
/// says so (deletes in particular).
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Point lookup by composite key.
    async fn get(&self, key: &RowKey) -> Result<Option<ConnectionRecord>, StoreError>;

    /// Insert or overwrite one row.
    async fn put(&self, record: ConnectionRecord) -> Result<(), StoreError>;

    /// Stamp the metadata row of `connection_id` as authenticated.
    async fn mark_authorized(
        &self,
        connection_id: &str,
        identity: &Identity,
        expiration: i64,
    ) -> Result<(), StoreError>;

    /// Indexed lookup of the connection ids subscribed to `channel`.
    /// Fails with [`StoreError::IndexUnavailable`] when no index exists.
    async fn query_by_channel(&self, channel: &str) -> Result<Vec<String>, StoreError>;

    /// Full-registry scan filtered on `channel`. Functionally equivalent to
    /// [`ConnectionStore::query_by_channel`] but O(registry size).
    async fn scan_by_channel(&self, channel: &str) -> Result<Vec<String>, StoreError>;

    /// Every row key (metadata and subscriptions) for one connection.
    async fn query_connection(&self, connection_id: &str) -> Result<Vec<RowKey>, StoreError>;

    /// Delete one row. Deleting an absent row is not an error.
    async fn delete(&self, key: &RowKey) -> Result<(), StoreError>;

    /// Delete up to [`MAX_DELETE_BATCH`] rows. Absent rows are skipped
    /// silently.
    async fn delete_batch(&self, keys: &[RowKey]) -> Result<(), StoreError>;
}
