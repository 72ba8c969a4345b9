//! Lock timing configuration.

use crate::error::LockError;
use serde::{Deserialize, Serialize};

/// Timing options for the edit lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConfig {
    /// Inactivity after which the lock is dropped (in milliseconds).
    pub lock_timeout_ms: u64,
    /// How long before expiry the warning is raised (in milliseconds).
    pub warning_lead_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 10 * 60 * 1000,
            warning_lead_ms: 60 * 1000,
        }
    }
}

impl LockConfig {
    /// Elapsed idle time at which the warning fires.
    pub fn warning_threshold_ms(&self) -> u64 {
        self.lock_timeout_ms.saturating_sub(self.warning_lead_ms)
    }

    pub fn validate(&self) -> Result<(), LockError> {
        if self.lock_timeout_ms == 0 {
            return Err(LockError::InvalidConfig(
                "lockTimeoutMs must be greater than zero".into(),
            ));
        }
        if self.warning_lead_ms >= self.lock_timeout_ms {
            return Err(LockError::InvalidConfig(format!(
                "warningLeadMs ({}) must be shorter than lockTimeoutMs ({})",
                self.warning_lead_ms, self.lock_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Builder for lock configuration.
pub struct LockConfigBuilder {
    config: LockConfig,
}

impl LockConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: LockConfig::default(),
        }
    }

    pub fn lock_timeout(mut self, ms: u64) -> Self {
        self.config.lock_timeout_ms = ms;
        self
    }

    pub fn warning_lead(mut self, ms: u64) -> Self {
        self.config.warning_lead_ms = ms;
        self
    }

    pub fn build(self) -> Result<LockConfig, LockError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for LockConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
