use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sensitive document (driver's-license photo) attached to a booking.
///
/// Replace-only: a new upload overwrites the reference, nothing edits it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveDocumentRef {
    pub url: String,
    /// Missing on rows that predate upload timestamps.
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Booking whose attached document has aged past the retention window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RetentionCandidate {
    pub booking_id: Uuid,
    pub document_url: String,
    pub document_uploaded_at: Option<DateTime<Utc>>,
    /// Check-in date; the retention clock starts here.
    pub eligibility_date: NaiveDate,
    /// Failed purge attempts recorded by earlier sweeps.
    pub purge_attempts: i32,
}

/// Terminal state of one candidate within a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PurgeOutcome {
    Purged {
        booking_id: Uuid,
        /// True when the remote object was already gone.
        already_absent: bool,
    },
    /// The remote object was deleted but the booking's reference had already
    /// changed, so it was left alone.
    Superseded { booking_id: Uuid, url: String },
    RemoteDeleteFailed {
        booking_id: Uuid,
        url: String,
        error: String,
        attempts: Option<i32>,
    },
}

impl PurgeOutcome {
    pub fn booking_id(&self) -> Uuid {
        match self {
            PurgeOutcome::Purged { booking_id, .. }
            | PurgeOutcome::Superseded { booking_id, .. }
            | PurgeOutcome::RemoteDeleteFailed { booking_id, .. } => *booking_id,
        }
    }

    pub fn is_purged(&self) -> bool {
        matches!(self, PurgeOutcome::Purged { .. })
    }
}

/// Result of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub found: usize,
    pub purged: usize,
    pub superseded: usize,
    pub failed: usize,
    /// Failures on bookings that have reached the alert threshold.
    pub alerting: usize,
    pub outcomes: Vec<PurgeOutcome>,
}

impl SweepSummary {
    pub fn record(&mut self, outcome: PurgeOutcome) {
        match outcome {
            PurgeOutcome::Purged { .. } => self.purged += 1,
            PurgeOutcome::Superseded { .. } => self.superseded += 1,
            PurgeOutcome::RemoteDeleteFailed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}
