//! Push-transport seam: delivering bytes to one live connection.

use async_trait::async_trait;
use thiserror::Error;

pub mod http;

pub use self::http::HttpPushTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote endpoint reported the connection as permanently
    /// unreachable (410 Gone or 403 Forbidden). The only classification that
    /// triggers a reap.
    #[error("connection gone (status {0})")]
    Gone(u16),

    /// Anything else: connect errors, timeouts, 5xx. Retryable by a later
    /// delivery; never proof the connection is dead.
    #[error("transient delivery failure: {0}")]
    Transient(#[source] anyhow::Error),
}

impl TransportError {
    #[must_use]
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone(_))
    }
}

/// Delivers one serialized message to one connection.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Post `data` to `connection_id`.
    ///
    /// # Errors
    /// [`TransportError::Gone`] when the endpoint confirms the connection is
    /// dead, [`TransportError::Transient`] for every other failure.
    async fn post_to_connection(
        &self,
        connection_id: &str,
        data: &[u8],
    ) -> Result<(), TransportError>;
}
