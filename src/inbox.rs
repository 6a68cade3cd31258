//! `with_idempotency` - the inbox gate guaranteeing at-most-once side effects.
//!
//! ## How It Works
//!
//! 1. Acquire the `(consumer, message_id)` lease.
//! 2. If the lease could not be acquired (live lease held elsewhere, or the
//!    message already reached a terminal status), skip the handler.
//! 3. Otherwise run the handler once and settle the lease with its outcome.
//!
//! ## Error Handling
//!
//! If the handler fails, the lease settles as `failed` and the handler's
//! error is re-raised to the caller so outer retry/NACK logic can see it.
//! `failed` is terminal here - the Dispatcher's retry machinery is a
//! separate concern from this gate's idempotency guarantee.

use std::future::Future;

use tracing::debug;

use crate::error::OutboxError;
use crate::ports::{InboxConfig, InboxStore};

/// Result of running a handler through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxOutcome {
    /// The handler ran and succeeded.
    Processed,
    /// The lease could not be acquired; the handler was not invoked.
    Skipped,
}

/// Runs `handler` at most once for the given `(consumer, message_id)` pair.
///
/// Returns the handler's error unchanged (not wrapped in [`OutboxError`]) if
/// it fails, after recording the failure as terminal.
pub async fn with_idempotency<F, Fut, E>(
    store: &dyn InboxStore,
    consumer: &str,
    message_id: &str,
    opts: &InboxConfig,
    handler: F,
) -> Result<InboxOutcome, IdempotencyError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    acquire_and_run(store, consumer, message_id, opts, handler).await
}

/// Error surface of [`with_idempotency`]: either the lease store itself
/// failed, or the handler ran and raised its own error `E`.
#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError<E> {
    #[error("inbox store error: {0}")]
    Store(#[from] OutboxError),

    #[error(transparent)]
    Handler(E),
}

async fn acquire_and_run<F, Fut, E>(
    store: &dyn InboxStore,
    consumer: &str,
    message_id: &str,
    opts: &InboxConfig,
    handler: F,
) -> Result<InboxOutcome, IdempotencyError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let acquired = store.acquire_lock(consumer, message_id, opts.ttl).await?;

    if !acquired {
        debug!(consumer, message_id, "lease not acquired, skipping");
        return Ok(InboxOutcome::Skipped);
    }

    match handler().await {
        Ok(()) => {
            store.mark_inbox_processed(consumer, message_id).await?;
            Ok(InboxOutcome::Processed)
        }
        Err(err) => {
            let error_msg = err.to_string();
            store.mark_inbox_failed(consumer, message_id, &error_msg).await?;
            Err(IdempotencyError::Handler(err))
        }
    }
}
