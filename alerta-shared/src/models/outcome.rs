use serde::{Deserialize, Serialize};

/// Terminal classification of one delivery attempt to one connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    /// The transport accepted the message.
    Delivered,
    /// The connection is permanently unreachable; its registry rows are
    /// reaped.
    Gone,
    /// Temporary failure (timeout, 5xx, connect error); never reaped.
    Transient,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryReport {
    pub connection_id: String,
    pub outcome: DeliveryOutcome,
}

/// Aggregate outcome counts for one envelope's fan-out.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliverySummary {
    pub delivered: usize,
    pub gone: usize,
    pub transient: usize,
}

impl DeliverySummary {
    #[must_use]
    pub fn from_reports(reports: &[DeliveryReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome {
                DeliveryOutcome::Delivered => summary.delivered += 1,
                DeliveryOutcome::Gone => summary.gone += 1,
                DeliveryOutcome::Transient => summary.transient += 1,
            }
        }
        summary
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.delivered + self.gone + self.transient
    }
}

/// Terminal disposition of one envelope at the intake boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EnvelopeOutcome {
    /// The envelope was invalid and dropped without side effects.
    Skipped { reason: String },
    /// The envelope was fanned out (possibly to zero subscribers).
    Delivered {
        #[serde(flatten)]
        summary: DeliverySummary,
    },
}

impl EnvelopeOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// Per-record disposition inside a batch report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecordStatus {
    Delivered {
        #[serde(flatten)]
        summary: DeliverySummary,
    },
    Skipped {
        reason: String,
    },
    /// The record failed on infrastructure (registry unreachable) and should
    /// be redelivered by the caller's retry mechanism.
    Retry {
        error: String,
    },
}

/// Outcome of processing one inbound batch, record by record.
///
/// Records are independent: a skipped or retryable record never affects its
/// siblings' dispositions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub records: Vec<RecordStatus>,
    pub summary: DeliverySummary,
    pub skipped: usize,
    pub retryable: usize,
}

impl BatchReport {
    pub fn push(&mut self, status: RecordStatus) {
        match &status {
            RecordStatus::Delivered { summary } => {
                self.summary.delivered += summary.delivered;
                self.summary.gone += summary.gone;
                self.summary.transient += summary.transient;
            }
            RecordStatus::Skipped { .. } => self.skipped += 1,
            RecordStatus::Retry { .. } => self.retryable += 1,
        }
        self.records.push(status);
    }
}
