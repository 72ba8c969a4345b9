//! Offline timing configuration.

use crate::error::OfflineError;
use serde::{Deserialize, Serialize};

/// Timing options for offline editing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineConfig {
    /// How long editing may continue while disconnected (in milliseconds).
    pub grace_ms: u64,
    /// Interval of the periodic snapshot while offline (in milliseconds).
    pub autosave_interval_ms: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            grace_ms: 10 * 60 * 1000,
            autosave_interval_ms: 5_000,
        }
    }
}

impl OfflineConfig {
    pub fn validate(&self) -> Result<(), OfflineError> {
        if self.grace_ms == 0 {
            return Err(OfflineError::InvalidConfig(
                "graceMs must be greater than zero".into(),
            ));
        }
        if self.autosave_interval_ms == 0 {
            return Err(OfflineError::InvalidConfig(
                "autosaveIntervalMs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for offline configuration.
pub struct OfflineConfigBuilder {
    config: OfflineConfig,
}

impl OfflineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: OfflineConfig::default(),
        }
    }

    pub fn grace(mut self, ms: u64) -> Self {
        self.config.grace_ms = ms;
        self
    }

    pub fn autosave_interval(mut self, ms: u64) -> Self {
        self.config.autosave_interval_ms = ms;
        self
    }

    pub fn build(self) -> Result<OfflineConfig, OfflineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for OfflineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
