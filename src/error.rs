//! Crate-wide error types.
//!
//! `OutboxError` is the single error type returned by every store, façade,
//! and dispatcher operation: a flat `thiserror` enum (see also
//! `config::ConfigError`) covering the one error taxonomy this crate needs -
//! validation, storage, and publish failures - with `#[from]` conversions at
//! each boundary.

use thiserror::Error;

use crate::domain::foundation::ValidationError;

/// Errors returned by outbox, dispatcher, and inbox store operations.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// `Outbox::emit` was called with a missing required field.
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] ValidationError),

    /// A database driver error occurred.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A row's `status` column held a value no known variant maps to -
    /// the schema and the application have drifted apart.
    #[error("storage error: invalid status value: {0}")]
    InvalidStatus(String),

    /// A `Publisher` raised an error while attempting delivery.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Opaque error raised by a [`crate::ports::Publisher`] implementation.
///
/// The dispatcher makes no distinction between transient and permanent
/// publish failures beyond the attempt counter: every publish error is
/// retried until `max_attempts` is exhausted, at which point the event is
/// dead-lettered.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct PublishError(#[from] Box<dyn std::error::Error + Send + Sync>);

impl PublishError {
    /// Wraps any error as a `PublishError`.
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}
