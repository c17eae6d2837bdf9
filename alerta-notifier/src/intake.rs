//! Notification intake: the boundary the external queue hands raw records
//! to, one JSON envelope per record.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use shared::models::{
    BatchReport, DeliverySummary, EnvelopeOutcome, FrameStyle, NotificationEnvelope, PushFrame,
    RecordStatus,
};

use crate::delivery::{DeliveryEngine, DeliveryError};
use crate::resolver::{ChannelResolver, ResolveError};

#[derive(Debug, Error)]
pub enum IntakeError {
    /// The registry was unreachable for this envelope. The caller's retry
    /// mechanism should redeliver the whole record.
    #[error("registry lookup failed: {0}")]
    Resolution(#[source] ResolveError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Drives resolve → fan-out for inbound envelopes.
pub struct NotificationIntake {
    resolver: Arc<ChannelResolver>,
    delivery: Arc<DeliveryEngine>,
    frame_style: FrameStyle,
}

impl std::fmt::Debug for NotificationIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationIntake")
            .field("frame_style", &self.frame_style)
            .finish()
    }
}

impl NotificationIntake {
    pub fn new(
        resolver: Arc<ChannelResolver>,
        delivery: Arc<DeliveryEngine>,
        frame_style: FrameStyle,
    ) -> Self {
        Self {
            resolver,
            delivery,
            frame_style,
        }
    }

    /// Process one raw record.
    ///
    /// Malformed JSON and envelopes without a channel are dropped here:
    /// logged, counted, no registry or transport access, not retryable. An
    /// addressable envelope is resolved and fanned out; zero subscribers is
    /// a successful no-op delivery.
    ///
    /// # Errors
    /// Only infrastructure failures (registry unreachable, frame encoding)
    /// surface as errors; those are the caller's cue to redeliver.
    #[instrument(name = "intake.handle_record", skip_all, err)]
    pub async fn handle_raw(&self, raw: &str) -> Result<EnvelopeOutcome, IntakeError> {
        let envelope: NotificationEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "dropping malformed notification record");
                counter!("alerta_intake_records_total", "disposition" => "malformed")
                    .increment(1);
                return Ok(EnvelopeOutcome::skipped("malformed json"));
            }
        };

        let targets = match self.resolver.resolve(&envelope).await {
            Ok(targets) => targets,
            Err(ResolveError::MissingChannel) => {
                warn!(
                    event_type = %envelope.event_type,
                    "dropping envelope without channelKey or viewId"
                );
                counter!("alerta_intake_records_total", "disposition" => "unaddressed")
                    .increment(1);
                return Ok(EnvelopeOutcome::skipped("missing channel key"));
            }
            Err(err @ ResolveError::Registry(_)) => {
                return Err(IntakeError::Resolution(err));
            }
        };

        if targets.is_empty() {
            debug!(
                channel = envelope.channel(),
                "no live subscribers for channel"
            );
            counter!("alerta_intake_records_total", "disposition" => "no_subscribers")
                .increment(1);
            return Ok(EnvelopeOutcome::Delivered {
                summary: DeliverySummary::default(),
            });
        }

        let frame = PushFrame::from_envelope(self.frame_style, &envelope);
        let reports = self.delivery.fan_out(&targets, &frame).await?;

        counter!("alerta_intake_records_total", "disposition" => "fanned_out").increment(1);
        Ok(EnvelopeOutcome::Delivered {
            summary: DeliverySummary::from_reports(&reports),
        })
    }

    /// Process a batch of raw records independently.
    ///
    /// A malformed or failed record never prevents the remaining records
    /// from being processed; retryable failures are marked per record so the
    /// caller can redeliver just those.
    pub async fn handle_batch(&self, records: &[String]) -> BatchReport {
        let mut report = BatchReport::default();

        for (idx, raw) in records.iter().enumerate() {
            match self.handle_raw(raw).await {
                Ok(EnvelopeOutcome::Delivered { summary }) => {
                    report.push(RecordStatus::Delivered { summary });
                }
                Ok(EnvelopeOutcome::Skipped { reason }) => {
                    report.push(RecordStatus::Skipped { reason });
                }
                Err(err) => {
                    error!(record = idx, error = %err, "record failed, leaving for redelivery");
                    report.push(RecordStatus::Retry {
                        error: err.to_string(),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::reaper::StaleConnectionReaper;
    use crate::registry::SubscriberRegistry;
    use crate::store::testing::MemoryStore;
    use crate::transport::testing::{Scripted, ScriptedTransport};

    fn intake(store: Arc<MemoryStore>, transport: Arc<ScriptedTransport>) -> NotificationIntake {
        let registry = Arc::new(SubscriberRegistry::new(store));
        let resolver = Arc::new(ChannelResolver::new(registry.clone()));
        let reaper = Arc::new(StaleConnectionReaper::new(registry));
        let delivery = Arc::new(DeliveryEngine::new(transport, reaper));
        NotificationIntake::new(resolver, delivery, FrameStyle::Action)
    }

    #[tokio::test]
    async fn fans_out_to_every_subscriber_with_identical_payloads() {
        let store = Arc::new(MemoryStore::with_subscriptions(&[
            ("c1", "incidentes"),
            ("c2", "incidentes"),
        ]));
        let transport = Arc::new(ScriptedTransport::new());
        let intake = intake(store, transport.clone());

        let outcome = intake
            .handle_raw(
                r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{"incidenciaId":"inc-1"}}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EnvelopeOutcome::Delivered {
                summary: DeliverySummary {
                    delivered: 2,
                    gone: 0,
                    transient: 0,
                },
            }
        );
        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], payloads[1]);
        assert!(
            String::from_utf8(payloads[0].clone())
                .unwrap()
                .contains(r#""incidenciaId":"inc-1""#)
        );
    }

    #[tokio::test]
    async fn envelope_without_channel_is_dropped_without_side_effects() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let intake = intake(store.clone(), transport.clone());

        let outcome = intake
            .handle_raw(r#"{"eventType":"IncidenteCreado","payload":{}}"#)
            .await
            .unwrap();

        assert!(matches!(outcome, EnvelopeOutcome::Skipped { .. }));
        assert_eq!(store.index_queries.load(Ordering::SeqCst), 0);
        assert_eq!(store.scan_queries.load(Ordering::SeqCst), 0);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_dropped_without_side_effects() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let intake = intake(store.clone(), transport.clone());

        let outcome = intake.handle_raw("{not json").await.unwrap();

        assert!(matches!(outcome, EnvelopeOutcome::Skipped { .. }));
        assert_eq!(store.index_queries.load(Ordering::SeqCst), 0);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn zero_subscribers_is_a_successful_no_op() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let intake = intake(store, transport.clone());

        let outcome = intake
            .handle_raw(r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{}}"#)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EnvelopeOutcome::Delivered {
                summary: DeliverySummary::default(),
            }
        );
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn registry_outage_surfaces_as_retryable_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_index.store(true, Ordering::SeqCst);
        store.fail_scan.store(true, Ordering::SeqCst);
        let transport = Arc::new(ScriptedTransport::new());
        let intake = intake(store, transport);

        let result = intake
            .handle_raw(r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{}}"#)
            .await;

        assert!(matches!(result, Err(IntakeError::Resolution(_))));
    }

    #[tokio::test]
    async fn malformed_record_does_not_block_the_rest_of_the_batch() {
        let store = Arc::new(MemoryStore::with_subscriptions(&[("c1", "incidentes")]));
        let transport = Arc::new(ScriptedTransport::new());
        let intake = intake(store, transport.clone());

        let records = vec![
            "{definitely not json".to_string(),
            r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{"incidenciaId":"inc-2"}}"#
                .to_string(),
        ];

        let report = intake.handle_batch(&records).await;

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.summary.delivered, 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn retryable_record_is_marked_without_aborting_siblings() {
        let store = Arc::new(MemoryStore::with_subscriptions(&[("c1", "incidentes")]));
        let transport = Arc::new(ScriptedTransport::new());
        let intake = intake(store.clone(), transport.clone());

        // First record hits a dead registry, the second is processed after
        // the registry recovers.
        store.fail_index.store(true, Ordering::SeqCst);
        store.fail_scan.store(true, Ordering::SeqCst);
        let first = intake
            .handle_batch(&[
                r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{}}"#
                    .to_string(),
            ])
            .await;
        assert_eq!(first.retryable, 1);

        store.fail_index.store(false, Ordering::SeqCst);
        store.fail_scan.store(false, Ordering::SeqCst);
        let second = intake
            .handle_batch(&[
                r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{}}"#
                    .to_string(),
            ])
            .await;
        assert_eq!(second.summary.delivered, 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn gone_subscriber_is_counted_and_cleaned_during_intake() {
        let store = Arc::new(MemoryStore::with_subscriptions(&[
            ("c1", "incidentes"),
            ("c2", "incidentes"),
        ]));
        let transport = Arc::new(ScriptedTransport::new());
        transport.script("c1", Scripted::Gone(410));
        let intake = intake(store.clone(), transport);

        let outcome = intake
            .handle_raw(r#"{"channelKey":"incidentes","eventType":"IncidenteCreado","payload":{}}"#)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EnvelopeOutcome::Delivered {
                summary: DeliverySummary {
                    delivered: 1,
                    gone: 1,
                    transient: 0,
                },
            }
        );
        assert!(!store.contains("c1", "incidentes"));
        assert!(store.contains("c2", "incidentes"));
    }
}
