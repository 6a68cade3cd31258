//! Transactional Outbox + Inbox - effectively-once messaging across a
//! producer, a transport, and a consumer.
//!
//! Three subsystems compose the crate:
//!
//! - [`outbox`] - the façade producers call inside their own database
//!   transaction to durably record an intent to publish.
//! - [`dispatcher`] - the background relay that claims outbox rows and
//!   publishes them via a caller-supplied [`ports::Publisher`].
//! - [`inbox`] - the idempotency gate consumers wrap their handlers in to
//!   guarantee a side effect runs at most once per message.

pub mod adapters;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod inbox;
pub mod outbox;
pub mod ports;

pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{OutboxError, PublishError};
pub use inbox::{with_idempotency, IdempotencyError, InboxOutcome};
pub use outbox::Outbox;
