//! InboxStore port - lease acquisition and settlement for the idempotency gate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::OutboxError;

/// Tunables for [`crate::inbox::with_idempotency`].
#[derive(Debug, Clone)]
pub struct InboxConfig {
    /// How long a lease is held before it becomes eligible for takeover.
    pub ttl: Duration,

    /// Name of the backing inbox table. Informational here - a concrete
    /// [`InboxStore`] binds its actual table at construction time, since
    /// `acquire_lock`/`mark_inbox_processed`/`mark_inbox_failed` take no
    /// `opts` argument and so cannot vary the table per call.
    pub table_name: String,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(300_000),
            table_name: "inbox_records".to_string(),
        }
    }
}

/// Port for acquiring and settling an inbox lease keyed by `(consumer, message_id)`.
///
/// Implementations perform an insert-or-takeover: a fresh key gets a new
/// `processing` row; an existing key whose lease has expired is taken over
/// (incrementing its retry count); an existing key with a live lease, or one
/// already settled, is left untouched and `acquire_lock` returns `false`.
#[async_trait]
pub trait InboxStore: Send + Sync {
    /// Attempt to acquire the lease. Returns `true` if the caller now owns
    /// it and should run the handler, `false` if another owner holds it or
    /// it has already reached a terminal status.
    async fn acquire_lock(
        &self,
        consumer: &str,
        message_id: &str,
        ttl: Duration,
    ) -> Result<bool, OutboxError>;

    /// Settle the lease as successfully processed. Absorbing.
    async fn mark_inbox_processed(
        &self,
        consumer: &str,
        message_id: &str,
    ) -> Result<(), OutboxError>;

    /// Settle the lease as failed. Terminal - no further takeover occurs.
    async fn mark_inbox_failed(
        &self,
        consumer: &str,
        message_id: &str,
        error_msg: &str,
    ) -> Result<(), OutboxError>;
}
