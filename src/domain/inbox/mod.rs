//! `InboxRecord` - the idempotency lease record, and its status lattice.
//!
//! A row is keyed by `(consumer, message_id)`. `acquire_lock` either inserts
//! a fresh `processing` row or takes over one whose `locked_until` has
//! expired, bumping `retry_count`.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// Status of an inbox lease.
///
/// Lattice: `Processing -> Processed | Failed`. `Processed` is absorbing.
/// `Failed` is terminal - no automatic retry is scheduled for it (an
/// operator must intervene out of band to make it eligible again).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    /// A handler is running, or was running and never settled before its lease expired.
    Processing,
    /// The handler ran to completion and succeeded. Terminal.
    Processed,
    /// The handler ran and raised an error. Terminal, no auto-retry.
    Failed,
}

/// A durable lease row in the inbox table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxRecord {
    pub consumer: String,
    pub message_id: String,
    pub status: InboxStatus,
    pub locked_until: Timestamp,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub retry_count: u32,
}

impl InboxRecord {
    /// Constructs a fresh lease in the `processing` state for a first attempt.
    pub fn new(consumer: impl Into<String>, message_id: impl Into<String>, ttl_until: Timestamp) -> Self {
        Self {
            consumer: consumer.into(),
            message_id: message_id.into(),
            status: InboxStatus::Processing,
            locked_until: ttl_until,
            created_at: Timestamp::now(),
            processed_at: None,
            last_error: None,
            retry_count: 0,
        }
    }

    /// True if an existing row is eligible for takeover: still `processing`
    /// but its lease has expired as of `now`.
    pub fn is_takeover_eligible(&self, now: Timestamp) -> bool {
        self.status == InboxStatus::Processing && !now.is_before(&self.locked_until)
    }

    /// Takes over an expired lease for a retry, incrementing `retry_count`.
    pub fn take_over(&mut self, ttl_until: Timestamp) {
        self.status = InboxStatus::Processing;
        self.locked_until = ttl_until;
        self.retry_count += 1;
        self.processed_at = None;
    }

    /// Settles the lease as successfully processed. Absorbing.
    pub fn mark_processed(&mut self) {
        self.status = InboxStatus::Processed;
        self.processed_at = Some(Timestamp::now());
        self.last_error = None;
    }

    /// Settles the lease as failed. Terminal - no further takeover occurs.
    pub fn mark_failed(&mut self, error_msg: impl Into<String>) {
        self.status = InboxStatus::Failed;
        self.last_error = Some(error_msg.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_processing_with_zero_retries() {
        let now = Timestamp::now();
        let record = InboxRecord::new("billing", "msg-1", now.plus_secs(300));
        assert_eq!(record.status, InboxStatus::Processing);
        assert_eq!(record.retry_count, 0);
        assert!(record.processed_at.is_none());
    }

    #[test]
    fn unexpired_processing_lease_is_not_takeover_eligible() {
        let now = Timestamp::now();
        let record = InboxRecord::new("billing", "msg-1", now.plus_secs(300));
        assert!(!record.is_takeover_eligible(now));
    }

    #[test]
    fn expired_processing_lease_is_takeover_eligible() {
        let now = Timestamp::now();
        let mut record = InboxRecord::new("billing", "msg-1", now);
        record.locked_until = now;
        assert!(record.is_takeover_eligible(now.plus_secs(1)));
    }

    #[test]
    fn processed_lease_is_never_takeover_eligible() {
        let now = Timestamp::now();
        let mut record = InboxRecord::new("billing", "msg-1", now);
        record.mark_processed();
        assert!(!record.is_takeover_eligible(now.plus_secs(9999)));
    }

    #[test]
    fn failed_lease_is_never_takeover_eligible() {
        let now = Timestamp::now();
        let mut record = InboxRecord::new("billing", "msg-1", now);
        record.mark_failed("boom");
        assert!(!record.is_takeover_eligible(now.plus_secs(9999)));
    }

    #[test]
    fn take_over_bumps_retry_count_and_extends_lease() {
        let now = Timestamp::now();
        let mut record = InboxRecord::new("billing", "msg-1", now);
        let new_deadline = now.plus_secs(300);
        record.take_over(new_deadline);
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.status, InboxStatus::Processing);
        assert_eq!(record.locked_until, new_deadline);
    }

    #[test]
    fn mark_processed_sets_terminal_status_and_timestamp() {
        let now = Timestamp::now();
        let mut record = InboxRecord::new("billing", "msg-1", now);
        record.mark_processed();
        assert_eq!(record.status, InboxStatus::Processed);
        assert!(record.processed_at.is_some());
    }

    #[test]
    fn mark_failed_sets_terminal_status_and_error() {
        let now = Timestamp::now();
        let mut record = InboxRecord::new("billing", "msg-1", now);
        record.mark_failed("handler panicked");
        assert_eq!(record.status, InboxStatus::Failed);
        assert_eq!(record.last_error.as_deref(), Some("handler panicked"));
    }
}
