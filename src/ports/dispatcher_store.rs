//! DispatcherStore port - batch claiming and settlement for the relay loop.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::domain::foundation::EventId;
use crate::domain::outbox::OutboxEvent;
use crate::error::OutboxError;

/// Tunables for the claim/settle loop, mirrored 1:1 onto [`crate::dispatcher::Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How often to poll for claimable rows when the previous poll found none.
    pub poll_interval: Duration,

    /// Maximum rows to claim per poll cycle.
    pub batch_size: u32,

    /// Attempts after which a failed row is dead-lettered instead of retried.
    pub max_attempts: u32,

    /// Backoff applied after the first failed attempt.
    pub initial_backoff: Duration,

    /// Multiplier applied to the backoff on each subsequent failed attempt.
    pub backoff_multiplier: f64,

    /// Name of the backing outbox table.
    pub table_name: String,

    /// How long a claimed-but-unsettled row is protected from being
    /// claimed again before its claim is considered abandoned.
    ///
    /// `claim_batch` durably marks every row it returns with `claimed_at`
    /// in the same statement as its `FOR UPDATE SKIP LOCKED` select, so
    /// the claim survives after that statement's implicit transaction
    /// commits and `publish` runs outside any held lock. A row is only
    /// claimable again once `claimed_at` is older than `claim_timeout` -
    /// this is what bounds the at-least-once recovery window for a worker
    /// that crashes between claim and settlement, while keeping a second,
    /// healthy worker from reclaiming the same row moments later.
    pub claim_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            batch_size: 50,
            max_attempts: 10,
            initial_backoff: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            table_name: "outbox_events".to_string(),
            claim_timeout: Duration::from_millis(300_000),
        }
    }
}

/// Computes the delay before the next retry attempt.
///
/// `delay = initial_backoff * multiplier^(new_attempts - 1)`, plus additive
/// jitter uniformly drawn from `[0, 10%]` of `delay` to avoid a thundering
/// herd of retries after a correlated outage.
pub fn backoff_delay(new_attempts: u32, opts: &DispatcherConfig) -> Duration {
    let base_ms = opts.initial_backoff.as_millis() as f64;
    let exponent = (new_attempts.saturating_sub(1)) as i32;
    let delay_ms = base_ms * opts.backoff_multiplier.powi(exponent);
    let jitter_ms = delay_ms * rand::rng().random_range(0.0..0.1);
    Duration::from_millis((delay_ms + jitter_ms).floor() as u64)
}

/// Port for claiming, and settling, batches of outbox rows.
///
/// `claim_batch` must be safe to call concurrently from multiple dispatcher
/// instances against the same table: two callers racing for the same row
/// must never both receive it - not just for the instant of the claim
/// query itself, but for the entire claim -> publish -> settle window,
/// since `publish` runs after the claim's own transaction has closed.
#[async_trait]
pub trait DispatcherStore: Send + Sync {
    /// Claim up to `batch_size` claimable rows (pending, or failed and past
    /// their `next_attempt_at`), durably marking each one as claimed in the
    /// same statement that locks it against concurrent claimants.
    ///
    /// The `FOR UPDATE SKIP LOCKED` row lock is released the instant this
    /// call's statement finishes, so the lock alone cannot keep a second
    /// caller from selecting the same row moments later while the first
    /// caller is still publishing it; the durable claim marker this writes
    /// (see `DispatcherConfig::claim_timeout`) is what actually does that.
    async fn claim_batch(
        &self,
        batch_size: u32,
        opts: &DispatcherConfig,
    ) -> Result<Vec<OutboxEvent>, OutboxError>;

    /// Settle a row as successfully published. Absorbing. Clears the claim
    /// marker `claim_batch` set, though a `sent` row is never claimable
    /// again regardless.
    async fn mark_outbox_sent(&self, event_id: EventId) -> Result<(), OutboxError>;

    /// Settle a row as failed, scheduling its next retry or dead-lettering it
    /// once `opts.max_attempts` is reached. Clears the claim marker so a
    /// retryable row becomes reclaimable as soon as `next_attempt_at`
    /// elapses, rather than waiting out the rest of `claim_timeout`.
    async fn mark_outbox_failed(
        &self,
        event_id: EventId,
        error_msg: &str,
        prior_attempts: u32,
        opts: &DispatcherConfig,
    ) -> Result<(), OutboxError>;
}
