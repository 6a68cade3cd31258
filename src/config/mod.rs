//! Application configuration module.
//!
//! Provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `OUTBOX_` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use outbox_core::config::AppConfig;
//!
//! let config = AppConfig::load().expect("failed to load configuration");
//! config.validate().expect("invalid configuration");
//! ```

mod database;
mod dispatcher;
mod error;
mod inbox;
mod server;

pub use database::DatabaseConfig;
pub use dispatcher::DispatcherSettings;
pub use error::{ConfigError, ValidationError};
pub use inbox::InboxSettings;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration.
///
/// Load using [`AppConfig::load()`], which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Environment and log filter, used only by the demo binary.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection).
    pub database: DatabaseConfig,

    /// Dispatcher overrides. Falls back to `DispatcherConfig::default()` for
    /// any field left unset.
    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    /// Inbox gate overrides. Falls back to `InboxConfig::default()` for any
    /// field left unset.
    #[serde(default)]
    pub inbox: InboxSettings,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// 1. Loads a `.env` file if present (development).
    /// 2. Reads environment variables with the `OUTBOX` prefix.
    /// 3. Uses `__` (double underscore) to separate nested values, e.g.
    ///    `OUTBOX__DATABASE__URL=...` -> `database.url = ...`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into their expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("OUTBOX")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        Ok(())
    }

    /// Check if running in production environment.
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("OUTBOX__DATABASE__URL", "postgresql://test@localhost/test");
    }

    fn clear_env() {
        env::remove_var("OUTBOX__DATABASE__URL");
        env::remove_var("OUTBOX__SERVER__ENVIRONMENT");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok());
        assert!(result.unwrap().validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("OUTBOX__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }

    #[test]
    fn test_dispatcher_and_inbox_default_to_unset_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.dispatcher.batch_size.is_none());
        assert!(config.inbox.ttl_ms.is_none());
    }
}
