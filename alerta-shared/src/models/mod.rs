pub mod connection;
pub mod envelope;
pub mod events;
pub mod outcome;

pub use connection::{ConnectionRecord, Identity, METADATA_CHANNEL, RowKey};
pub use envelope::{FrameStyle, NotificationEnvelope, PushFrame};
pub use events::{IncidentEventKind, Urgency};
pub use outcome::{
    BatchReport, DeliveryOutcome, DeliveryReport, DeliverySummary, EnvelopeOutcome, RecordStatus,
};
