//! PostgreSQL adapter - the one store implementing every port over `sqlx::PgPool`.

mod store;

pub use store::PostgresStore;
