use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Field naming used when framing an outbound push message.
///
/// Older clients expect `{"type": ..., "data": ...}`, current ones
/// `{"action": ..., "payload": ...}`. The style is fixed per deployment and
/// never mixed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FrameStyle {
    Action,
    Type,
}

fn default_event_type() -> String {
    "notification".to_string()
}

/// One inbound unit of work: a domain event to fan out to live subscribers.
///
/// `channelKey` is the preferred addressing field; `viewId` is the legacy
/// alias still emitted by older producers. An envelope carrying neither is
/// invalid and must be dropped before any registry access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEnvelope {
    /// Logical channel the event travels on.
    #[serde(rename = "channelKey", default, skip_serializing_if = "Option::is_none")]
    pub channel_key: Option<String>,

    /// Legacy channel alias, used only when `channelKey` is absent.
    #[serde(rename = "viewId", default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,

    /// Event tag forwarded verbatim to subscribers (e.g. `IncidenteCreado`).
    #[serde(rename = "eventType", default = "default_event_type")]
    pub event_type: String,

    /// Opaque event payload, forwarded untouched.
    #[serde(default)]
    pub payload: Value,

    /// Producer-stamped RFC 3339 timestamp, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl NotificationEnvelope {
    pub fn new(channel: impl Into<String>, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            channel_key: Some(channel.into()),
            view_id: None,
            event_type: event_type.into(),
            payload,
            timestamp: None,
        }
    }

    /// The effective channel: `channelKey` if present, else the legacy
    /// `viewId`.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel_key.as_deref().or(self.view_id.as_deref())
    }
}

/// The outbound message pushed verbatim to every resolved connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PushFrame {
    style: FrameStyle,
    event_type: String,
    payload: Value,
}

impl PushFrame {
    pub fn new(style: FrameStyle, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            style,
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn from_envelope(style: FrameStyle, envelope: &NotificationEnvelope) -> Self {
        Self::new(style, envelope.event_type.clone(), envelope.payload.clone())
    }

    /// Render the frame with the deployment's field naming.
    #[must_use]
    pub fn render(&self) -> Value {
        match self.style {
            FrameStyle::Action => json!({
                "action": self.event_type,
                "payload": self.payload,
            }),
            FrameStyle::Type => json!({
                "type": self.event_type,
                "data": self.payload,
            }),
        }
    }
}
