use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved channel key for the per-connection metadata row. Not a
/// subscribable channel.
pub const METADATA_CHANNEL: &str = "metadata";

/// Authenticated identity stamped on a connection's metadata row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: String,
}

/// Composite key of one registry row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub connection_id: String,
    pub channel_key: String,
}

impl RowKey {
    pub fn new(connection_id: impl Into<String>, channel_key: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            channel_key: channel_key.into(),
        }
    }
}

/// One registry row.
///
/// Every connection has exactly one metadata row (channel key
/// [`METADATA_CHANNEL`]) carrying the authentication state, plus one row per
/// channel subscription. All rows sharing a connection id live and die
/// together: deleting a connection removes every row, never a subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionRecord {
    pub connection_id: String,
    pub channel_key: String,
    pub connected_at: DateTime<Utc>,
    pub authorized: bool,
    pub user_id: Option<String>,
    pub role: Option<String>,
    /// Epoch seconds after which the session counts as unauthenticated.
    pub expiration: Option<i64>,
}

impl ConnectionRecord {
    /// The metadata row written when a connection is first registered.
    pub fn metadata(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            channel_key: METADATA_CHANNEL.to_string(),
            connected_at: Utc::now(),
            authorized: false,
            user_id: None,
            role: None,
            expiration: None,
        }
    }

    /// A subscription row mapping a connection to a channel.
    pub fn subscription(
        connection_id: impl Into<String>,
        channel_key: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            channel_key: channel_key.into(),
            connected_at: Utc::now(),
            authorized: false,
            user_id: None,
            role: None,
            expiration: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> RowKey {
        RowKey::new(self.connection_id.clone(), self.channel_key.clone())
    }

    #[must_use]
    pub fn is_metadata(&self) -> bool {
        self.channel_key == METADATA_CHANNEL
    }
}
