//! Publisher port - delivery of a claimed event to a transport.

use async_trait::async_trait;

use crate::domain::outbox::OutboxEvent;
use crate::error::PublishError;

/// Port for delivering a claimed outbox event to whatever transport the
/// embedding application uses (a message broker, webhook, etc).
///
/// The dispatcher treats every `publish` error identically - it does not
/// distinguish transient from permanent failures beyond the attempt
/// counter, so implementations don't need to classify their own errors.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Called once before the dispatcher's poll loop starts.
    async fn start(&self) -> Result<(), PublishError> {
        Ok(())
    }

    /// Called once after the dispatcher's poll loop has drained and stopped.
    async fn stop(&self) -> Result<(), PublishError> {
        Ok(())
    }

    /// Deliver a single claimed event.
    async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError>;
}
