//! Adapters - Implementations of port interfaces.
//!
//! - `postgres` - the `sqlx`-backed store implementing every port against a
//!   real Postgres database
//! - `publisher` - `FnPublisher`, adapting a plain async closure to [`crate::ports::Publisher`]

pub mod postgres;
pub mod publisher;

pub use postgres::PostgresStore;
pub use publisher::FnPublisher;
