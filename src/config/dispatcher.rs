//! Environment-driven overrides for [`crate::ports::DispatcherConfig`].

use serde::Deserialize;

use crate::ports::DispatcherConfig;

/// Optional overrides for the dispatcher, loaded under the `dispatcher`
/// section of [`super::AppConfig`]. Any field left unset falls back to
/// `DispatcherConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatcherSettings {
    pub poll_interval_ms: Option<u64>,
    pub batch_size: Option<u32>,
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub table_name: Option<String>,
    pub claim_timeout_ms: Option<u64>,
}

impl DispatcherSettings {
    /// Merges these overrides onto [`DispatcherConfig::default`].
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        let defaults = DispatcherConfig::default();
        DispatcherConfig {
            poll_interval: self
                .poll_interval_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff: self
                .initial_backoff_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(defaults.backoff_multiplier),
            table_name: self.table_name.clone().unwrap_or(defaults.table_name),
            claim_timeout: self
                .claim_timeout_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(defaults.claim_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_yield_defaults() {
        let settings = DispatcherSettings::default();
        let config = settings.to_dispatcher_config();
        let defaults = DispatcherConfig::default();

        assert_eq!(config.batch_size, defaults.batch_size);
        assert_eq!(config.max_attempts, defaults.max_attempts);
        assert_eq!(config.poll_interval, defaults.poll_interval);
    }

    #[test]
    fn overrides_take_precedence() {
        let settings = DispatcherSettings {
            batch_size: Some(10),
            max_attempts: Some(3),
            ..Default::default()
        };
        let config = settings.to_dispatcher_config();

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.poll_interval, DispatcherConfig::default().poll_interval);
    }
}
