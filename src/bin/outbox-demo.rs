//! Minimal smoke-test binary wiring the outbox, dispatcher, and a
//! stdout-printing publisher against a real Postgres database.
//!
//! Not a packaged operator CLI - just enough to watch one event flow
//! end to end: `Outbox::emit` inside a transaction, `Dispatcher` claiming
//! and publishing it, settlement back to `sent`.

use std::sync::Arc;

use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use outbox_core::adapters::postgres::PostgresStore;
use outbox_core::adapters::publisher::FnPublisher;
use outbox_core::config::AppConfig;
use outbox_core::domain::outbox::NewOutboxEvent;
use outbox_core::ports::DispatcherConfig;
use outbox_core::{Dispatcher, Outbox, PublishError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.server.log_level))
        .init();

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;

    let store = Arc::new(PostgresStore::new(pool.clone()));
    let outbox = Outbox::new(store.clone());

    let publisher = Arc::new(FnPublisher::new(|event| async move {
        println!("publishing {} ({})", event.event_id, event.event_type);
        Ok::<(), PublishError>(())
    }));

    let dispatcher_opts: DispatcherConfig = config.dispatcher.to_dispatcher_config();
    let handle = Dispatcher::start(store, publisher, dispatcher_opts);

    let mut tx = pool.begin().await?;
    let event_id = outbox
        .emit(
            &mut tx,
            NewOutboxEvent {
                aggregate_type: "Demo".to_string(),
                aggregate_id: "demo-1".to_string(),
                event_type: "demo.started".to_string(),
                payload: json!({ "message": "hello from outbox-demo" }),
                headers: None,
            },
        )
        .await?;
    tx.commit().await?;

    tracing::info!(%event_id, "emitted demo event");

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    handle.stop().await;

    Ok(())
}
