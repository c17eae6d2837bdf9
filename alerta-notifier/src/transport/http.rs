//! HTTP push transport.
//!
//! Connections are addressed as `{endpoint}/@connections/{connectionId}`,
//! the management-API convention of the websocket gateway in front of this
//! service.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use http::header::CONTENT_TYPE;

use super::{PushTransport, TransportError};

/// Statuses that prove the remote connection is permanently unreachable.
const GONE_STATUSES: [u16; 2] = [410, 403];

#[derive(Debug, Clone)]
pub struct HttpPushTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPushTransport {
    /// Build a transport against `endpoint` with a per-request timeout.
    ///
    /// The timeout bounds each delivery attempt; a timed-out attempt is a
    /// transient failure, never a gone one.
    ///
    /// # Errors
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn post_to_connection(
        &self,
        connection_id: &str,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let url = format!("{}/@connections/{connection_id}", self.endpoint);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|err| TransportError::Transient(err.into()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if GONE_STATUSES.contains(&status.as_u16()) {
            return Err(TransportError::Gone(status.as_u16()));
        }
        Err(TransportError::Transient(anyhow!(
            "push endpoint returned {status} for connection {connection_id}"
        )))
    }
}
