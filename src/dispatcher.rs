//! `Dispatcher` - the background relay that claims outbox rows and publishes them.
//!
//! ## Pattern Overview
//!
//! 1. Command handlers write events to the outbox (same transaction as
//!    domain changes, via [`crate::outbox::Outbox`]).
//! 2. **`Dispatcher` polls the outbox and publishes to the configured
//!    [`Publisher`]** - this module.
//!
//! ## Graceful Shutdown
//!
//! `stop` cancels the worker's current sleep and waits for the in-flight
//! batch to finish settling before returning.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::outbox::OutboxEvent;
use crate::error::OutboxError;
use crate::ports::{DispatcherConfig, DispatcherStore, Publisher};

/// Cool-down applied after an unexpected error in the poll loop body, to
/// protect against tight failure loops (e.g. the database being down).
const LOOP_ERROR_COOLDOWN: Duration = Duration::from_secs(5);

/// Background relay publishing claimed outbox rows.
///
/// Constructed via [`Dispatcher::start`], which spawns the worker task and
/// returns a [`DispatcherHandle`] for cooperative shutdown.
pub struct Dispatcher<S: DispatcherStore> {
    store: Arc<S>,
    publisher: Arc<dyn Publisher>,
    opts: DispatcherConfig,
}

impl<S: DispatcherStore + 'static> Dispatcher<S> {
    /// Spawns the poll/publish/settle loop as a dedicated `tokio` task.
    ///
    /// Multiple `start` calls in the same process, even against the same
    /// table, yield independent workers; correctness under concurrent
    /// claiming is delegated to the store's skip-locked claim, not to
    /// process-local coordination.
    pub fn start(store: Arc<S>, publisher: Arc<dyn Publisher>, opts: DispatcherConfig) -> DispatcherHandle {
        let dispatcher = Dispatcher {
            store,
            publisher,
            opts,
        };
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();

        let join_handle = tokio::spawn(async move {
            dispatcher.run(worker_cancel).await;
        });

        DispatcherHandle {
            cancel,
            join_handle: Some(join_handle),
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        if let Err(err) = self.publisher.start().await {
            error!(error = %err, "publisher failed to start");
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.poll_once().await {
                Ok(0) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = time::sleep(self.opts.poll_interval) => {}
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    error!(error = %err, "dispatcher poll cycle failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = time::sleep(LOOP_ERROR_COOLDOWN) => {}
                    }
                }
            }
        }

        if let Err(err) = self.publisher.stop().await {
            error!(error = %err, "publisher failed to stop cleanly");
        }
    }

    async fn poll_once(&self) -> Result<usize, OutboxError> {
        let batch = self.store.claim_batch(self.opts.batch_size, &self.opts).await?;
        let claimed = batch.len();

        if claimed > 0 {
            debug!(claimed, "claimed outbox batch");
        }

        for event in batch {
            self.process_event(event).await;
        }

        Ok(claimed)
    }

    async fn process_event(&self, event: OutboxEvent) {
        let event_id = event.event_id;
        let prior_attempts = event.attempts;

        match self.publisher.publish(&event).await {
            Ok(()) => {
                if let Err(err) = self.store.mark_outbox_sent(event_id).await {
                    error!(error = %err, %event_id, "failed to settle sent event, will be reclaimed");
                }
            }
            Err(err) => {
                warn!(error = %err, %event_id, "publish failed, scheduling retry");
                if let Err(settle_err) = self
                    .store
                    .mark_outbox_failed(event_id, &err.to_string(), prior_attempts, &self.opts)
                    .await
                {
                    error!(error = %settle_err, %event_id, "failed to settle failed event, will be reclaimed");
                }
            }
        }
    }
}

/// Handle returned by [`Dispatcher::start`], used to stop the worker.
pub struct DispatcherHandle {
    cancel: CancellationToken,
    join_handle: Option<tokio::task::JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Signals the worker to stop, interrupts its sleep, and waits for the
    /// in-flight batch to finish settling before returning.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            if let Err(err) = handle.await {
                error!(error = %err, "dispatcher worker task panicked");
            }
        }
        info!("dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::EventId;
    use crate::domain::outbox::NewOutboxEvent;
    use crate::error::PublishError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct FakeStore {
        pending: Mutex<Vec<OutboxEvent>>,
        sent: Mutex<Vec<EventId>>,
        failed: Mutex<Vec<EventId>>,
        notify: Notify,
    }

    impl FakeStore {
        fn new(events: Vec<OutboxEvent>) -> Self {
            Self {
                pending: Mutex::new(events),
                sent: Mutex::new(Vec::new()),
                failed: Mutex::new(Vec::new()),
                notify: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl DispatcherStore for FakeStore {
        async fn claim_batch(
            &self,
            batch_size: u32,
            _opts: &DispatcherConfig,
        ) -> Result<Vec<OutboxEvent>, OutboxError> {
            let mut pending = self.pending.lock().unwrap();
            let take = (batch_size as usize).min(pending.len());
            let claimed: Vec<_> = pending.drain(..take).collect();
            if !claimed.is_empty() {
                self.notify.notify_one();
            }
            Ok(claimed)
        }

        async fn mark_outbox_sent(&self, event_id: EventId) -> Result<(), OutboxError> {
            self.sent.lock().unwrap().push(event_id);
            Ok(())
        }

        async fn mark_outbox_failed(
            &self,
            event_id: EventId,
            _error_msg: &str,
            _prior_attempts: u32,
            _opts: &DispatcherConfig,
        ) -> Result<(), OutboxError> {
            self.failed.lock().unwrap().push(event_id);
            Ok(())
        }
    }

    struct CountingPublisher {
        count: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        async fn publish(&self, _event: &OutboxEvent) -> Result<(), PublishError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PublishError::new("boom"));
            }
            Ok(())
        }
    }

    fn sample_event() -> OutboxEvent {
        OutboxEvent::new(NewOutboxEvent {
            aggregate_type: "Order".to_string(),
            aggregate_id: "order-1".to_string(),
            event_type: "order.created".to_string(),
            payload: json!({}),
            headers: None,
        })
    }

    #[tokio::test]
    async fn successful_publish_marks_event_sent() {
        let store = Arc::new(FakeStore::new(vec![sample_event()]));
        let publisher = Arc::new(CountingPublisher {
            count: AtomicUsize::new(0),
            fail: false,
        });
        let opts = DispatcherConfig {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        };

        let handle = Dispatcher::start(store.clone(), publisher.clone(), opts);
        store.notify.notified().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop().await;

        assert_eq!(store.sent.lock().unwrap().len(), 1);
        assert_eq!(store.failed.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn failed_publish_marks_event_failed() {
        let store = Arc::new(FakeStore::new(vec![sample_event()]));
        let publisher = Arc::new(CountingPublisher {
            count: AtomicUsize::new(0),
            fail: true,
        });
        let opts = DispatcherConfig {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        };

        let handle = Dispatcher::start(store.clone(), publisher.clone(), opts);
        store.notify.notified().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop().await;

        assert_eq!(store.failed.lock().unwrap().len(), 1);
        assert_eq!(store.sent.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn stop_returns_promptly_with_no_pending_work() {
        let store = Arc::new(FakeStore::new(vec![]));
        let publisher = Arc::new(CountingPublisher {
            count: AtomicUsize::new(0),
            fail: false,
        });
        let opts = DispatcherConfig {
            poll_interval: Duration::from_secs(30),
            ..Default::default()
        };

        let handle = Dispatcher::start(store, publisher, opts);
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop should not block on the poll sleep");
    }
}
