//! Environment-driven overrides for [`crate::ports::InboxConfig`].

use serde::Deserialize;

use crate::ports::InboxConfig;

/// Optional overrides for the inbox gate, loaded under the `inbox` section
/// of [`super::AppConfig`]. Any field left unset falls back to
/// `InboxConfig::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxSettings {
    pub ttl_ms: Option<u64>,
    pub table_name: Option<String>,
}

impl InboxSettings {
    /// Merges these overrides onto [`InboxConfig::default`].
    pub fn to_inbox_config(&self) -> InboxConfig {
        let defaults = InboxConfig::default();
        InboxConfig {
            ttl: self
                .ttl_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(defaults.ttl),
            table_name: self.table_name.clone().unwrap_or(defaults.table_name),
        }
    }
}
