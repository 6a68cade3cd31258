//! `PostgresStore` - the sole production adapter, backing every port with
//! plain `sqlx` queries against a `PgPool`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::foundation::{EventId, Timestamp};
use crate::domain::outbox::{NewOutboxEvent, OutboxEvent, OutboxStatus};
use crate::error::OutboxError;
use crate::ports::{backoff_delay, DispatcherConfig, DispatcherStore, InboxStore, OutboxStore};

fn status_to_string(status: OutboxStatus) -> &'static str {
    match status {
        OutboxStatus::Pending => "pending",
        OutboxStatus::Sent => "sent",
        OutboxStatus::Failed => "failed",
        OutboxStatus::Dead => "dead",
    }
}

fn parse_status(s: &str) -> Result<OutboxStatus, OutboxError> {
    match s {
        "pending" => Ok(OutboxStatus::Pending),
        "sent" => Ok(OutboxStatus::Sent),
        "failed" => Ok(OutboxStatus::Failed),
        "dead" => Ok(OutboxStatus::Dead),
        other => Err(OutboxError::InvalidStatus(other.to_string())),
    }
}

/// Row shape returned by outbox queries, before conversion to [`OutboxEvent`].
///
/// `status` is carried as `String` rather than the domain `OutboxStatus`
/// enum - sqlx maps a Postgres `text` column onto whatever Rust type a row
/// field names, but round-tripping it through the domain enum directly
/// would let a row with a status the application no longer knows about
/// fail to decode at all instead of surfacing as an ordinary error.
/// `parse_status`/`status_to_string` above do the conversion explicitly.
///
/// `attempts` is carried as `i32` because Postgres has no unsigned integer
/// type; the domain model's `u32` is the saturating non-negative view of it.
///
/// `claimed_at` is a storage-layer concurrency control detail, not part of
/// the durable-intent-to-publish data model `OutboxEvent` represents, so it
/// is read here but dropped by the conversion below.
#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    event_id: EventId,
    aggregate_type: String,
    aggregate_id: String,
    event_type: String,
    payload: serde_json::Value,
    headers: Option<serde_json::Value>,
    status: String,
    attempts: i32,
    next_attempt_at: Option<Timestamp>,
    created_at: Timestamp,
    published_at: Option<Timestamp>,
    last_error: Option<String>,
    dead_at: Option<Timestamp>,
    #[allow(dead_code)]
    claimed_at: Option<Timestamp>,
}

impl TryFrom<OutboxRow> for OutboxEvent {
    type Error = OutboxError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(OutboxEvent {
            event_id: row.event_id,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: row.payload,
            headers: row.headers,
            status: parse_status(&row.status)?,
            attempts: row.attempts.max(0) as u32,
            next_attempt_at: row.next_attempt_at,
            created_at: row.created_at,
            published_at: row.published_at,
            last_error: row.last_error,
            dead_at: row.dead_at,
        })
    }
}

/// A `sqlx`-backed implementation of [`OutboxStore`], [`DispatcherStore`], and
/// [`InboxStore`] over a single Postgres connection pool.
///
/// One struct satisfies all three store ports because, in this crate, they
/// are three views onto the same two tables rather than independent
/// subsystems with independent storage needs.
///
/// The outbox/inbox table names are bound here at construction rather than
/// threaded through every call's `opts`: `OutboxStore::emit` and
/// `DispatcherStore::mark_outbox_sent` (and every `InboxStore` method) take
/// no `opts` argument at all, so a table name that varied per call would be
/// unreachable from them. Binding it once keeps every method - claiming,
/// settling, emitting - agreeing on the same physical table.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    outbox_table: String,
    inbox_table: String,
}

impl PostgresStore {
    /// Builds a store against the default table names (`outbox_events`,
    /// `inbox_records`), matching `migrations/*.sql`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            outbox_table: "outbox_events".to_string(),
            inbox_table: "inbox_records".to_string(),
        }
    }

    /// Builds a store against explicitly named tables, for deployments that
    /// rename `DispatcherConfig::table_name` / `InboxConfig::table_name`
    /// away from the migration defaults.
    pub fn with_table_names(pool: PgPool, outbox_table: impl Into<String>, inbox_table: impl Into<String>) -> Self {
        Self {
            pool,
            outbox_table: outbox_table.into(),
            inbox_table: inbox_table.into(),
        }
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn emit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new_event: NewOutboxEvent,
    ) -> Result<EventId, OutboxError> {
        new_event.validate()?;
        let event = OutboxEvent::new(new_event);

        let query = format!(
            r#"
            INSERT INTO {table} (
                event_id, aggregate_type, aggregate_id, event_type, payload, headers,
                status, attempts, next_attempt_at, created_at, published_at, last_error, dead_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
            table = self.outbox_table
        );

        sqlx::query(&query)
            .bind(event.event_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(&event.aggregate_id)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(&event.headers)
            .bind(status_to_string(event.status))
            .bind(event.attempts as i32)
            .bind(event.next_attempt_at)
            .bind(event.created_at)
            .bind(event.published_at)
            .bind(&event.last_error)
            .bind(event.dead_at)
            .execute(&mut **tx)
            .await?;

        Ok(event.event_id)
    }
}

#[async_trait]
impl DispatcherStore for PostgresStore {
    async fn claim_batch(
        &self,
        batch_size: u32,
        opts: &DispatcherConfig,
    ) -> Result<Vec<OutboxEvent>, OutboxError> {
        // The table queried is the one this store was constructed against,
        // not `opts.table_name` - `mark_outbox_sent` takes no `opts` at all
        // (per the store contract), so the table identity has to live on
        // `self` for every method to agree on it. It is interpolated rather
        // than bound because identifiers can't be bind parameters in Postgres.
        //
        // `FOR UPDATE SKIP LOCKED` only holds its row lock for the duration
        // of this statement - it releases the instant the statement
        // finishes, well before `publish` runs. Selecting candidates alone
        // would let a second caller claim the same still-`pending` row
        // moments later. `claimed` durably marks every selected row with
        // `claimed_at` in the same statement, so the claim survives after
        // this call's implicit transaction commits; a row only reappears as
        // a candidate once its `claimed_at` is older than `claim_timeout`.
        let query = format!(
            r#"
            WITH candidates AS (
                SELECT event_id FROM {table}
                WHERE (status = 'pending' AND (claimed_at IS NULL OR claimed_at <= $4))
                   OR (status = 'failed' AND next_attempt_at <= $1 AND attempts < $2
                       AND (claimed_at IS NULL OR claimed_at <= $4))
                ORDER BY created_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            ),
            claimed AS (
                UPDATE {table}
                SET claimed_at = $1
                WHERE event_id IN (SELECT event_id FROM candidates)
                RETURNING event_id, aggregate_type, aggregate_id, event_type, payload, headers,
                          status, attempts, next_attempt_at, created_at, published_at, last_error,
                          dead_at, claimed_at
            )
            SELECT * FROM claimed ORDER BY created_at ASC
            "#,
            table = self.outbox_table
        );

        let now = Utc::now();
        let claim_cutoff = now - chrono::Duration::from_std(opts.claim_timeout).unwrap_or_default();

        let rows: Vec<OutboxRow> = sqlx::query_as(&query)
            .bind(now)
            .bind(opts.max_attempts as i32)
            .bind(batch_size as i64)
            .bind(claim_cutoff)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(OutboxEvent::try_from).collect()
    }

    async fn mark_outbox_sent(&self, event_id: EventId) -> Result<(), OutboxError> {
        let query = format!(
            r#"
            UPDATE {table}
            SET status = 'sent', published_at = $2, next_attempt_at = NULL, claimed_at = NULL
            WHERE event_id = $1
            "#,
            table = self.outbox_table
        );

        sqlx::query(&query)
            .bind(event_id.as_uuid())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_outbox_failed(
        &self,
        event_id: EventId,
        error_msg: &str,
        prior_attempts: u32,
        opts: &DispatcherConfig,
    ) -> Result<(), OutboxError> {
        let new_attempts = prior_attempts + 1;

        if new_attempts >= opts.max_attempts {
            tracing::warn!(%event_id, new_attempts, "dead-lettering outbox event");

            let query = format!(
                r#"
                UPDATE {table}
                SET status = 'dead', attempts = $2, last_error = $3, dead_at = $4,
                    next_attempt_at = NULL, claimed_at = NULL
                WHERE event_id = $1
                "#,
                table = self.outbox_table
            );

            sqlx::query(&query)
                .bind(event_id.as_uuid())
                .bind(new_attempts as i32)
                .bind(error_msg)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
        } else {
            let delay = backoff_delay(new_attempts, opts);
            let next_attempt_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
            tracing::debug!(%event_id, new_attempts, "scheduling outbox retry");

            let query = format!(
                r#"
                UPDATE {table}
                SET status = 'failed', attempts = $2, last_error = $3, next_attempt_at = $4,
                    claimed_at = NULL
                WHERE event_id = $1
                "#,
                table = self.outbox_table
            );

            sqlx::query(&query)
                .bind(event_id.as_uuid())
                .bind(new_attempts as i32)
                .bind(error_msg)
                .bind(next_attempt_at)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl InboxStore for PostgresStore {
    async fn acquire_lock(
        &self,
        consumer: &str,
        message_id: &str,
        ttl: std::time::Duration,
    ) -> Result<bool, OutboxError> {
        let now = Utc::now();
        let locked_until = now + chrono::Duration::from_std(ttl).unwrap_or_default();

        let insert_query = format!(
            r#"
            INSERT INTO {table} (consumer, message_id, status, locked_until, created_at, retry_count)
            VALUES ($1, $2, 'processing', $3, $4, 0)
            ON CONFLICT (consumer, message_id) DO NOTHING
            "#,
            table = self.inbox_table
        );

        let inserted = sqlx::query(&insert_query)
            .bind(consumer)
            .bind(message_id)
            .bind(locked_until)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if inserted.rows_affected() == 1 {
            return Ok(true);
        }

        let takeover_query = format!(
            r#"
            UPDATE {table}
            SET status = 'processing', locked_until = $3, retry_count = retry_count + 1,
                last_error = 'Takeover from crash'
            WHERE consumer = $1 AND message_id = $2
              AND status = 'processing' AND locked_until <= $4
            "#,
            table = self.inbox_table
        );

        let taken_over = sqlx::query(&takeover_query)
            .bind(consumer)
            .bind(message_id)
            .bind(locked_until)
            .bind(now)
            .execute(&self.pool)
            .await?;

        let took_over = taken_over.rows_affected() == 1;
        if took_over {
            tracing::debug!(consumer, message_id, "took over expired inbox lease");
        }

        Ok(took_over)
    }

    async fn mark_inbox_processed(
        &self,
        consumer: &str,
        message_id: &str,
    ) -> Result<(), OutboxError> {
        let query = format!(
            r#"
            UPDATE {table}
            SET status = 'processed', processed_at = $3, last_error = NULL
            WHERE consumer = $1 AND message_id = $2
            "#,
            table = self.inbox_table
        );

        sqlx::query(&query)
            .bind(consumer)
            .bind(message_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_inbox_failed(
        &self,
        consumer: &str,
        message_id: &str,
        error_msg: &str,
    ) -> Result<(), OutboxError> {
        tracing::warn!(consumer, message_id, error_msg, "inbox handler failed, lease terminal");

        let query = format!(
            r#"
            UPDATE {table} SET status = 'failed', last_error = $3
            WHERE consumer = $1 AND message_id = $2
            "#,
            table = self.inbox_table
        );

        sqlx::query(&query)
            .bind(consumer)
            .bind(message_id)
            .bind(error_msg)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
