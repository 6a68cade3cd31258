//! Server configuration - environment and log filter for the demo binary.

use serde::Deserialize;

/// Process-level configuration used by `src/bin/outbox-demo.rs`.
///
/// The library itself (`Outbox`, `Dispatcher`, `with_idempotency`) owns no
/// environment or socket surface; this is scoped to the demo binary only.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Environment name.
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// `tracing_subscriber::EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Application environment.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    /// Check if running in production.
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Validate server configuration. No constraints beyond deserialization
    /// today; kept as a stable hook alongside `DatabaseConfig::validate`.
    pub fn validate(&self) -> Result<(), super::error::ValidationError> {
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
        }
    }
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_log_level() -> String {
    "info,outbox_core=debug,sqlx=warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.log_level, "info,outbox_core=debug,sqlx=warn");
    }

    #[test]
    fn test_is_production() {
        let mut config = ServerConfig::default();
        assert!(!config.is_production());

        config.environment = Environment::Production;
        assert!(config.is_production());
    }
}
