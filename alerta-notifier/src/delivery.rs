//! Fan-out delivery engine.
//!
//! One message, many connections: the frame is serialized once, every
//! attempt runs concurrently, and the call settles only when all attempts
//! have. Per-connection failures stay per-connection.

use std::sync::Arc;

use futures::future::join_all;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use shared::models::{DeliveryOutcome, DeliveryReport, PushFrame};

use crate::reaper::StaleConnectionReaper;
use crate::transport::{PushTransport, TransportError};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Delivers one frame to a resolved set of connections.
pub struct DeliveryEngine {
    transport: Arc<dyn PushTransport>,
    reaper: Arc<StaleConnectionReaper>,
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine").finish()
    }
}

impl DeliveryEngine {
    pub fn new(transport: Arc<dyn PushTransport>, reaper: Arc<StaleConnectionReaper>) -> Self {
        Self { transport, reaper }
    }

    /// Fan the frame out to every connection and classify each attempt.
    ///
    /// The frame is serialized exactly once; every connection receives the
    /// same bytes. Attempts run concurrently and the call returns when all
    /// of them have settled, so a stuck or failed attempt never blocks its
    /// siblings. Each gone outcome triggers one reap before the call
    /// returns; reap failures are logged and swallowed here so they cannot
    /// fail the fan-out.
    ///
    /// # Errors
    /// Only frame serialization can fail; no transport outcome does.
    #[instrument(
        name = "delivery.fan_out",
        skip(self, connection_ids, frame),
        fields(targets = connection_ids.len())
    )]
    pub async fn fan_out(
        &self,
        connection_ids: &[String],
        frame: &PushFrame,
    ) -> Result<Vec<DeliveryReport>, DeliveryError> {
        if connection_ids.is_empty() {
            return Ok(Vec::new());
        }

        let bytes = serde_json::to_vec(&frame.render())?;
        histogram!("alerta_fanout_targets").record(connection_ids.len() as f64);

        let attempts = connection_ids.iter().map(|connection_id| {
            let bytes = &bytes;
            async move {
                let outcome = match self.transport.post_to_connection(connection_id, bytes).await {
                    Ok(()) => {
                        debug!(%connection_id, "notified");
                        DeliveryOutcome::Delivered
                    }
                    Err(TransportError::Gone(status)) => {
                        warn!(%connection_id, status, "connection is gone");
                        DeliveryOutcome::Gone
                    }
                    Err(TransportError::Transient(err)) => {
                        warn!(%connection_id, error = %err, "delivery failed, not reaping");
                        DeliveryOutcome::Transient
                    }
                };
                DeliveryReport {
                    connection_id: connection_id.clone(),
                    outcome,
                }
            }
        });

        let reports = join_all(attempts).await;

        for report in &reports {
            counter!(
                "alerta_deliveries_total",
                "outcome" => outcome_label(report.outcome)
            )
            .increment(1);
        }

        // Clean up after the whole fan-out has settled so a slow reap never
        // delays sibling deliveries.
        for report in &reports {
            if report.outcome == DeliveryOutcome::Gone {
                if let Err(err) = self.reaper.reap(&report.connection_id).await {
                    warn!(
                        connection_id = %report.connection_id,
                        error = %err,
                        "stale-connection cleanup failed; will retry on next gone delivery"
                    );
                }
            }
        }

        Ok(reports)
    }
}

fn outcome_label(outcome: DeliveryOutcome) -> &'static str {
    match outcome {
        DeliveryOutcome::Delivered => "delivered",
        DeliveryOutcome::Gone => "gone",
        DeliveryOutcome::Transient => "transient",
    }
}
