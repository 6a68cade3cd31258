//! OutboxStore port - transactional persistence of outbox rows.
//!
//! This port implements the write half of the Transactional Outbox Pattern:
//! a caller writes a business state change and a pending outbox row in the
//! same database transaction, so the two can never diverge.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::domain::foundation::EventId;
use crate::domain::outbox::NewOutboxEvent;
use crate::error::OutboxError;

/// Port for writing a new event to the outbox inside a live transaction.
///
/// Implementations must not open or manage a transaction of their own -
/// they write into the one the caller hands them, so the insert commits or
/// rolls back atomically with whatever else that transaction touches.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert a new pending outbox row, assigning it a fresh [`EventId`].
    async fn emit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new_event: NewOutboxEvent,
    ) -> Result<EventId, OutboxError>;
}
