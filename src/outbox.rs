//! `Outbox` - the façade producers call to emit an event transactionally.

use std::sync::Arc;

use sqlx::{Postgres, Transaction};

use crate::domain::foundation::EventId;
use crate::domain::outbox::NewOutboxEvent;
use crate::error::OutboxError;
use crate::ports::OutboxStore;

/// Thin wrapper binding a caller's live transaction to an [`OutboxStore`].
///
/// `Outbox` owns no transaction lifecycle of its own - the caller opens and
/// commits `tx`. Atomicity with whatever business write accompanies the
/// event is exactly the property of reusing the caller's transaction rather
/// than `Outbox` opening its own.
pub struct Outbox {
    store: Arc<dyn OutboxStore>,
}

impl Outbox {
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self { store }
    }

    /// Validates and inserts a new outbox row inside `tx`.
    pub async fn emit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new_event: NewOutboxEvent,
    ) -> Result<EventId, OutboxError> {
        self.store.emit(tx, new_event).await
    }
}
