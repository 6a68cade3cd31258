//! FnPublisher - adapts a plain async closure to a [`Publisher`].

use std::future::Future;

use async_trait::async_trait;

use crate::domain::outbox::OutboxEvent;
use crate::error::PublishError;
use crate::ports::Publisher;

/// Wraps an `Fn(&OutboxEvent) -> impl Future<Output = Result<(), PublishError>>`
/// closure as a [`Publisher`] with no-op `start`/`stop` lifecycle hooks.
///
/// This is the adapter a demo binary or a small integration test reaches
/// for instead of writing a one-off struct per transport.
pub struct FnPublisher<F> {
    publish_fn: F,
}

impl<F, Fut> FnPublisher<F>
where
    F: Fn(&OutboxEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), PublishError>> + Send,
{
    pub fn new(publish_fn: F) -> Self {
        Self { publish_fn }
    }
}

#[async_trait]
impl<F, Fut> Publisher for FnPublisher<F>
where
    F: Fn(&OutboxEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), PublishError>> + Send,
{
    async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError> {
        (self.publish_fn)(event).await
    }
}
