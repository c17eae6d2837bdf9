//! Postgres-backed [`ConnectionStore`].
//!
//! One table holds both row kinds: the per-connection metadata row
//! (`channel_key = 'metadata'`) and one row per subscription, keyed by
//! `(connection_id, channel_key)`.

use sqlx::PgPool;

use async_trait::async_trait;
use shared::models::{ConnectionRecord, Identity, METADATA_CHANNEL, RowKey};

use super::{ConnectionStore, MAX_DELETE_BATCH, StoreError};

#[derive(Debug, Clone)]
pub struct PgConnectionStore {
    pool: PgPool,
    /// Name of the secondary index over `channel_key`. `None` means indexed
    /// lookups are unavailable and callers must scan.
    channel_index: Option<String>,
}

impl PgConnectionStore {
    pub fn new(pool: PgPool, channel_index: Option<String>) -> Self {
        Self {
            pool,
            channel_index,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConnectionRow {
    connection_id: String,
    channel_key: String,
    connected_at: chrono::DateTime<chrono::Utc>,
    authorized: bool,
    user_id: Option<String>,
    role: Option<String>,
    expiration: Option<i64>,
}

impl From<ConnectionRow> for ConnectionRecord {
    fn from(row: ConnectionRow) -> Self {
        ConnectionRecord {
            connection_id: row.connection_id,
            channel_key: row.channel_key,
            connected_at: row.connected_at,
            authorized: row.authorized,
            user_id: row.user_id,
            role: row.role,
            expiration: row.expiration,
        }
    }
}

#[async_trait]
impl ConnectionStore for PgConnectionStore {
    async fn get(&self, key: &RowKey) -> Result<Option<ConnectionRecord>, StoreError> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            "SELECT connection_id, channel_key, connected_at, authorized, user_id, role, expiration \
             FROM ws_connections WHERE connection_id = $1 AND channel_key = $2",
        )
        .bind(&key.connection_id)
        .bind(&key.channel_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ConnectionRecord::from))
    }

    async fn put(&self, record: ConnectionRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO ws_connections \
                 (connection_id, channel_key, connected_at, authorized, user_id, role, expiration) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (connection_id, channel_key) DO UPDATE SET \
                 connected_at = EXCLUDED.connected_at, \
                 authorized = EXCLUDED.authorized, \
                 user_id = EXCLUDED.user_id, \
                 role = EXCLUDED.role, \
                 expiration = EXCLUDED.expiration",
        )
        .bind(&record.connection_id)
        .bind(&record.channel_key)
        .bind(record.connected_at)
        .bind(record.authorized)
        .bind(&record.user_id)
        .bind(&record.role)
        .bind(record.expiration)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_authorized(
        &self,
        connection_id: &str,
        identity: &Identity,
        expiration: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE ws_connections \
             SET authorized = TRUE, user_id = $2, role = $3, expiration = $4 \
             WHERE connection_id = $1 AND channel_key = $5",
        )
        .bind(connection_id)
        .bind(&identity.user_id)
        .bind(&identity.role)
        .bind(expiration)
        .bind(METADATA_CHANNEL)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingConnection(connection_id.to_string()));
        }
        Ok(())
    }

    async fn query_by_channel(&self, channel: &str) -> Result<Vec<String>, StoreError> {
        if self.channel_index.is_none() {
            return Err(StoreError::IndexUnavailable);
        }

        let ids = sqlx::query_scalar::<_, String>(
            "SELECT connection_id FROM ws_connections WHERE channel_key = $1",
        )
        .bind(channel)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn scan_by_channel(&self, channel: &str) -> Result<Vec<String>, StoreError> {
        // Degraded path: pull every row and filter in process.
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT connection_id, channel_key FROM ws_connections",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter(|(_, key)| key == channel)
            .map(|(id, _)| id)
            .collect())
    }

    async fn query_connection(&self, connection_id: &str) -> Result<Vec<RowKey>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT connection_id, channel_key FROM ws_connections WHERE connection_id = $1",
        )
        .bind(connection_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, channel)| RowKey::new(id, channel))
            .collect())
    }

    async fn delete(&self, key: &RowKey) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM ws_connections WHERE connection_id = $1 AND channel_key = $2")
            .bind(&key.connection_id)
            .bind(&key.channel_key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_batch(&self, keys: &[RowKey]) -> Result<(), StoreError> {
        if keys.len() > MAX_DELETE_BATCH {
            return Err(StoreError::BatchTooLarge(keys.len()));
        }
        if keys.is_empty() {
            return Ok(());
        }

        let connection_ids: Vec<String> = keys.iter().map(|k| k.connection_id.clone()).collect();
        let channel_keys: Vec<String> = keys.iter().map(|k| k.channel_key.clone()).collect();

        sqlx::query(
            "DELETE FROM ws_connections \
             WHERE (connection_id, channel_key) IN \
                 (SELECT * FROM UNNEST($1::text[], $2::text[]))",
        )
        .bind(&connection_ids)
        .bind(&channel_keys)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
