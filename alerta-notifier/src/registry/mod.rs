//! Subscriber registry service.
//!
//! Wraps the row store with the channel-lookup fallback, batched deletes, and
//! the connection lifecycle (register, authenticate, subscribe, disconnect).

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{error, instrument, warn};

use shared::models::{ConnectionRecord, Identity, METADATA_CHANNEL, RowKey};

use crate::store::{ConnectionStore, MAX_DELETE_BATCH, StoreError};

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The channel key is empty or the reserved metadata sentinel.
    #[error("invalid channel key {0:?}")]
    InvalidChannel(String),

    /// No metadata row exists for the connection.
    #[error("unknown connection {0}")]
    UnknownConnection(String),

    /// The connection has not completed authentication.
    #[error("connection {0} is not authorized")]
    Unauthorized(String),

    /// The connection's session expiry has passed.
    #[error("session for connection {0} has expired")]
    SessionExpired(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registry of live connections and their channel subscriptions.
pub struct SubscriberRegistry {
    store: Arc<dyn ConnectionStore>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry").finish()
    }
}

impl SubscriberRegistry {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self { store }
    }

    /// Connection ids subscribed to `channel`.
    ///
    /// Prefers the store's indexed lookup. When the index is unavailable or
    /// the indexed query fails, degrades to a full scan; the caller only sees
    /// the latency difference. A channel nobody subscribes to is an empty
    /// list, not an error.
    ///
    /// # Errors
    /// Fails only when both the indexed lookup and the scan fail.
    #[instrument(name = "registry.lookup_by_channel", skip(self), err)]
    pub async fn lookup_by_channel(&self, channel: &str) -> Result<Vec<String>, RegistryError> {
        match self.store.query_by_channel(channel).await {
            Ok(ids) => Ok(ids),
            Err(err) => {
                warn!(
                    channel,
                    error = %err,
                    "indexed channel lookup failed, falling back to full scan"
                );
                counter!("alerta_registry_scan_fallback_total").increment(1);
                Ok(self.store.scan_by_channel(channel).await?)
            }
        }
    }

    /// Every row (metadata and subscriptions) for one connection.
    ///
    /// # Errors
    /// Fails when the store query fails.
    pub async fn connection_rows(&self, connection_id: &str) -> Result<Vec<RowKey>, RegistryError> {
        Ok(self.store.query_connection(connection_id).await?)
    }

    /// Delete rows in store-sized batches.
    ///
    /// Sets larger than the store's batch cap are chunked, never truncated.
    /// Deleting rows that no longer exist is not an error.
    ///
    /// # Errors
    /// Fails on the first chunk the store rejects; the failed chunk is
    /// logged so a later retry can pick it up.
    pub async fn delete_rows(&self, rows: &[RowKey]) -> Result<(), RegistryError> {
        for chunk in rows.chunks(MAX_DELETE_BATCH) {
            if let Err(err) = self.store.delete_batch(chunk).await {
                error!(
                    rows = ?chunk,
                    error = %err,
                    "failed to delete registry rows"
                );
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Write the metadata row for a newly connected transport session.
    ///
    /// # Errors
    /// Fails when the store write fails.
    #[instrument(name = "registry.register_connection", skip(self), err)]
    pub async fn register_connection(&self, connection_id: &str) -> Result<(), RegistryError> {
        self.store
            .put(ConnectionRecord::metadata(connection_id))
            .await?;
        Ok(())
    }

    /// Stamp a connection's metadata row with its authenticated identity and
    /// session expiry (epoch seconds).
    ///
    /// # Errors
    /// Fails with [`RegistryError::UnknownConnection`] if the connection was
    /// never registered.
    #[instrument(name = "registry.authenticate", skip(self, identity), err)]
    pub async fn authenticate(
        &self,
        connection_id: &str,
        identity: &Identity,
        expiration: i64,
    ) -> Result<(), RegistryError> {
        match self
            .store
            .mark_authorized(connection_id, identity, expiration)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::MissingConnection(id)) => Err(RegistryError::UnknownConnection(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Return the identity of an authenticated, unexpired connection.
    ///
    /// # Errors
    /// Fails when the connection is unknown, not yet authenticated, or past
    /// its session expiry.
    pub async fn verify_connection(&self, connection_id: &str) -> Result<Identity, RegistryError> {
        let key = RowKey::new(connection_id, METADATA_CHANNEL);
        let record = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| RegistryError::UnknownConnection(connection_id.to_string()))?;

        if !record.authorized {
            return Err(RegistryError::Unauthorized(connection_id.to_string()));
        }
        let now = chrono::Utc::now().timestamp();
        if record.expiration.is_none_or(|exp| now > exp) {
            return Err(RegistryError::SessionExpired(connection_id.to_string()));
        }

        Ok(Identity {
            user_id: record.user_id.unwrap_or_default(),
            role: record.role.unwrap_or_default(),
        })
    }

    /// Record interest of `connection_id` in `channel`.
    ///
    /// # Errors
    /// Fails when the channel key is empty or reserved, or the store write
    /// fails.
    #[instrument(name = "registry.subscribe", skip(self), err)]
    pub async fn subscribe(&self, connection_id: &str, channel: &str) -> Result<(), RegistryError> {
        validate_channel(channel)?;
        self.store
            .put(ConnectionRecord::subscription(connection_id, channel))
            .await?;
        Ok(())
    }

    /// Remove one subscription row. Removing a subscription that does not
    /// exist is not an error.
    ///
    /// # Errors
    /// Fails when the channel key is invalid or the store delete fails.
    #[instrument(name = "registry.unsubscribe", skip(self), err)]
    pub async fn unsubscribe(
        &self,
        connection_id: &str,
        channel: &str,
    ) -> Result<(), RegistryError> {
        validate_channel(channel)?;
        self.store
            .delete(&RowKey::new(connection_id, channel))
            .await?;
        Ok(())
    }

    /// Remove every row for a connection. Returns the number of rows removed;
    /// an already-clean connection is `Ok(0)`.
    ///
    /// # Errors
    /// Fails when row enumeration or deletion fails.
    #[instrument(name = "registry.disconnect", skip(self), err)]
    pub async fn disconnect(&self, connection_id: &str) -> Result<usize, RegistryError> {
        let rows = self.connection_rows(connection_id).await?;
        if rows.is_empty() {
            return Ok(0);
        }
        self.delete_rows(&rows).await?;
        Ok(rows.len())
    }
}

fn validate_channel(channel: &str) -> Result<(), RegistryError> {
    if channel.is_empty() || channel == METADATA_CHANNEL {
        return Err(RegistryError::InvalidChannel(channel.to_string()));
    }
    Ok(())
}
