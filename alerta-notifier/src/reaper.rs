//! Stale-connection reaper.
//!
//! A delivery classified as gone means the connection is dead but its
//! registry rows linger. The reaper removes them all, the metadata row and
//! every subscription row alike, so later fan-outs stop targeting the
//! corpse.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::registry::{RegistryError, SubscriberRegistry};

#[derive(Debug, Error)]
pub enum ReapError {
    /// Enumerating the connection's rows failed; nothing was deleted.
    #[error("failed to enumerate rows for {connection_id}: {source}")]
    Lookup {
        connection_id: String,
        #[source]
        source: RegistryError,
    },

    /// Deleting the rows failed, possibly after some batches succeeded. The
    /// next gone delivery to the same id retries the remainder.
    #[error("failed to delete {total} rows for {connection_id}: {source}")]
    Delete {
        connection_id: String,
        total: usize,
        #[source]
        source: RegistryError,
    },
}

/// Removes every registry row of a connection confirmed dead.
#[derive(Debug)]
pub struct StaleConnectionReaper {
    registry: Arc<SubscriberRegistry>,
}

impl StaleConnectionReaper {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Reap all rows for `connection_id`. Returns the number of rows removed.
    ///
    /// Idempotent: a connection with no rows left is `Ok(0)` and issues no
    /// deletes, so concurrent reaps of the same id are safe.
    ///
    /// # Errors
    /// Lookup and delete failures are reported to the caller, which logs and
    /// moves on; a reap failure must never block deliveries to other
    /// connections.
    #[instrument(name = "reaper.reap", skip(self), err)]
    pub async fn reap(&self, connection_id: &str) -> Result<usize, ReapError> {
        let rows = self
            .registry
            .connection_rows(connection_id)
            .await
            .map_err(|source| ReapError::Lookup {
                connection_id: connection_id.to_string(),
                source,
            })?;

        if rows.is_empty() {
            debug!(connection_id, "nothing to reap");
            return Ok(0);
        }

        self.registry
            .delete_rows(&rows)
            .await
            .map_err(|source| ReapError::Delete {
                connection_id: connection_id.to_string(),
                total: rows.len(),
                source,
            })?;

        counter!("alerta_reaped_rows_total").increment(rows.len() as u64);
        info!(connection_id, rows = rows.len(), "reaped stale connection");
        Ok(rows.len())
    }
}
