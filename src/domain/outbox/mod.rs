//! `OutboxEvent` - a durable intent to publish, and its status lattice.
//!
//! ## Pattern Overview
//!
//! 1. A caller writes an `OutboxEvent` row inside the same database
//!    transaction as its business state change (`Outbox::emit`).
//! 2. The `Dispatcher` (background service) claims pending/retryable rows,
//!    publishes them, and settles the terminal status.
//! 3. `sent` and `dead` are absorbing: once reached, the row is never
//!    written again.
//!
//! Status transitions and claim eligibility are the invariants this module
//! enforces; see the struct and method docs below for each rule.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::foundation::{EventId, Timestamp, ValidationError};

/// Status of an outbox row in the delivery pipeline.
///
/// Lattice: `Pending -> Sent | Failed`, `Failed -> Sent | Failed | Dead`.
/// `Sent` and `Dead` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Written but not yet successfully published.
    Pending,
    /// Published exactly once, terminal.
    Sent,
    /// A publish attempt failed; eligible for retry once `next_attempt_at` elapses.
    Failed,
    /// Retry budget exhausted; terminal, requires operator intervention.
    Dead,
}

/// The fields a caller supplies when emitting a new event.
///
/// `Outbox::emit` validates this and assigns a fresh [`EventId`] plus
/// `created_at`; the caller never supplies either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOutboxEvent {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub headers: Option<JsonValue>,
}

impl NewOutboxEvent {
    /// Validates the four required fields.
    ///
    /// `emit` fails if `aggregate_type`, `aggregate_id`, or `event_type` is
    /// empty, or if `payload` is `null` (the JSON stand-in for "missing").
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.aggregate_type.is_empty() {
            return Err(ValidationError::empty_field("aggregate_type"));
        }
        if self.aggregate_id.is_empty() {
            return Err(ValidationError::empty_field("aggregate_id"));
        }
        if self.event_type.is_empty() {
            return Err(ValidationError::empty_field("event_type"));
        }
        if self.payload.is_null() {
            return Err(ValidationError::empty_field("payload"));
        }
        Ok(())
    }
}

/// A durable row in the outbox table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub event_id: EventId,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub headers: Option<JsonValue>,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub next_attempt_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub published_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub dead_at: Option<Timestamp>,
}

impl OutboxEvent {
    /// Constructs a new `pending` row from a validated [`NewOutboxEvent`].
    ///
    /// Callers should call [`NewOutboxEvent::validate`] first; this
    /// constructor does not re-validate, matching the façade's single
    /// validate-then-construct flow.
    pub fn new(new_event: NewOutboxEvent) -> Self {
        Self {
            event_id: EventId::new(),
            aggregate_type: new_event.aggregate_type,
            aggregate_id: new_event.aggregate_id,
            event_type: new_event.event_type,
            payload: new_event.payload,
            headers: new_event.headers,
            status: OutboxStatus::Pending,
            attempts: 0,
            next_attempt_at: None,
            created_at: Timestamp::now(),
            published_at: None,
            last_error: None,
            dead_at: None,
        }
    }

    /// True if this row is claimable right now given `max_attempts`.
    ///
    /// Pending rows are always eligible; failed rows are eligible once
    /// `next_attempt_at` has elapsed and the retry budget is not exhausted.
    pub fn is_claimable(&self, now: Timestamp, max_attempts: u32) -> bool {
        match self.status {
            OutboxStatus::Pending => true,
            OutboxStatus::Failed => {
                self.attempts < max_attempts
                    && self.next_attempt_at.is_some_and(|at| !now.is_before(&at))
            }
            OutboxStatus::Sent | OutboxStatus::Dead => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> NewOutboxEvent {
        NewOutboxEvent {
            aggregate_type: "Order".to_string(),
            aggregate_id: "order-1".to_string(),
            event_type: "order.created".to_string(),
            payload: json!({"total": 42}),
            headers: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_event() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_aggregate_type() {
        let mut event = sample();
        event.aggregate_type = String::new();
        assert_eq!(
            event.validate().unwrap_err(),
            ValidationError::empty_field("aggregate_type")
        );
    }

    #[test]
    fn validate_rejects_empty_aggregate_id() {
        let mut event = sample();
        event.aggregate_id = String::new();
        assert!(event.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_event_type() {
        let mut event = sample();
        event.event_type = String::new();
        assert!(event.validate().is_err());
    }

    #[test]
    fn validate_rejects_null_payload() {
        let mut event = sample();
        event.payload = JsonValue::Null;
        assert!(event.validate().is_err());
    }

    #[test]
    fn new_event_starts_pending_with_zero_attempts() {
        let event = OutboxEvent::new(sample());
        assert_eq!(event.status, OutboxStatus::Pending);
        assert_eq!(event.attempts, 0);
        assert!(event.published_at.is_none());
        assert!(event.dead_at.is_none());
    }

    #[test]
    fn pending_event_is_always_claimable() {
        let event = OutboxEvent::new(sample());
        assert!(event.is_claimable(Timestamp::now(), 10));
    }

    #[test]
    fn failed_event_not_yet_due_is_not_claimable() {
        let mut event = OutboxEvent::new(sample());
        event.status = OutboxStatus::Failed;
        event.attempts = 1;
        event.next_attempt_at = Some(Timestamp::now().plus_secs(60));
        assert!(!event.is_claimable(Timestamp::now(), 10));
    }

    #[test]
    fn failed_event_past_due_is_claimable() {
        let mut event = OutboxEvent::new(sample());
        event.status = OutboxStatus::Failed;
        event.attempts = 1;
        let now = Timestamp::now();
        event.next_attempt_at = Some(now);
        assert!(event.is_claimable(now, 10));
    }

    #[test]
    fn failed_event_exhausting_attempts_is_not_claimable() {
        let mut event = OutboxEvent::new(sample());
        event.status = OutboxStatus::Failed;
        event.attempts = 10;
        event.next_attempt_at = Some(Timestamp::now());
        assert!(!event.is_claimable(Timestamp::now(), 10));
    }

    #[test]
    fn sent_and_dead_events_are_never_claimable() {
        let mut sent = OutboxEvent::new(sample());
        sent.status = OutboxStatus::Sent;
        assert!(!sent.is_claimable(Timestamp::now(), 10));

        let mut dead = OutboxEvent::new(sample());
        dead.status = OutboxStatus::Dead;
        assert!(!dead.is_claimable(Timestamp::now(), 10));
    }
}
