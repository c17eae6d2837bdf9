//! Channel resolution: envelope → list of candidate connection ids.

use std::sync::Arc;

use thiserror::Error;

use shared::models::NotificationEnvelope;

use crate::registry::{RegistryError, SubscriberRegistry};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The envelope carries neither `channelKey` nor the legacy `viewId`.
    /// Non-retryable; no registry access happens.
    #[error("envelope has neither channelKey nor viewId")]
    MissingChannel,

    /// The registry lookup failed entirely. Retryable by reprocessing the
    /// envelope.
    #[error("registry lookup failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Resolves an envelope's target channel to the set of live subscriber
/// connections.
#[derive(Debug)]
pub struct ChannelResolver {
    registry: Arc<SubscriberRegistry>,
}

impl ChannelResolver {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Candidate connection ids for the envelope's channel.
    ///
    /// `channelKey` wins over the legacy `viewId`; an envelope with neither
    /// is rejected before any registry access. A channel without subscribers
    /// resolves to an empty list.
    ///
    /// # Errors
    /// [`ResolveError::MissingChannel`] for an unaddressable envelope,
    /// [`ResolveError::Registry`] when the registry is unreachable.
    pub async fn resolve(
        &self,
        envelope: &NotificationEnvelope,
    ) -> Result<Vec<String>, ResolveError> {
        let channel = envelope.channel().ok_or(ResolveError::MissingChannel)?;
        Ok(self.registry.lookup_by_channel(channel).await?)
    }
}
