//! Editor configuration.

use crate::error::SdkError;
use serde::{Deserialize, Serialize};
use sheetlock_lock::LockConfig;
use sheetlock_offline::OfflineConfig;

/// Configuration for an editor session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    pub lock: LockConfig,
    pub offline: OfflineConfig,
    /// Upper bound between store re-reads while a lock is live
    /// (in milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            offline: OfflineConfig::default(),
            poll_interval_ms: 1000,
        }
    }
}

impl EditorConfig {
    pub fn validate(&self) -> Result<(), SdkError> {
        self.lock.validate()?;
        self.offline.validate()?;
        if self.poll_interval_ms == 0 {
            return Err(SdkError::InvalidConfig(
                "pollIntervalMs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for editor configuration.
pub struct EditorConfigBuilder {
    config: EditorConfig,
}

impl EditorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
        }
    }

    pub fn lock_timeout(mut self, ms: u64) -> Self {
        self.config.lock.lock_timeout_ms = ms;
        self
    }

    pub fn warning_lead(mut self, ms: u64) -> Self {
        self.config.lock.warning_lead_ms = ms;
        self
    }

    pub fn offline_grace(mut self, ms: u64) -> Self {
        self.config.offline.grace_ms = ms;
        self
    }

    pub fn autosave_interval(mut self, ms: u64) -> Self {
        self.config.offline.autosave_interval_ms = ms;
        self
    }

    pub fn poll_interval(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn build(self) -> Result<EditorConfig, SdkError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EditorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
