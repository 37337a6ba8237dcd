use std::time::Duration;

use serde::Deserialize;
use tms_api::StoreError;

/// Janitor settings, usually the `[janitor]` section of a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct JanitorConfig {
    /// How often the background task refreshes transaction state.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Cached state older than this is treated as absent.
    #[serde(default = "default_max_state_age_ms")]
    pub max_state_age_ms: u64,
}

fn default_refresh_interval_ms() -> u64 {
    5_000
}

fn default_max_state_age_ms() -> u64 {
    60_000
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            max_state_age_ms: default_max_state_age_ms(),
        }
    }
}

impl JanitorConfig {
    pub fn parse(toml_str: &str) -> Result<Self, StoreError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| StoreError::config(e.to_string()))?;
        if config.refresh_interval_ms == 0 {
            return Err(StoreError::config("refresh_interval_ms must be positive"));
        }
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn max_state_age(&self) -> Duration {
        Duration::from_millis(self.max_state_age_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = JanitorConfig::parse("").unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.max_state_age(), Duration::from_secs(60));

        let config = JanitorConfig::parse("max_state_age_ms = 10").unwrap();
        assert_eq!(config.max_state_age_ms, 10);
        assert!(JanitorConfig::parse("refresh_interval_ms = 0").is_err());
    }
}
