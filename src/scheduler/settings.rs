use crate::config::{CaptureConfig, MIN_INTERVAL_MS};
use crate::error::{RoiscanError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sampling period and (advisory) change sensitivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    pub interval_ms: u64,
    pub sensitivity: u8,
}

/// Partial settings change; `None` keeps the current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSettingsUpdate {
    pub interval_ms: Option<u64>,
    pub sensitivity: Option<u8>,
}

impl CaptureSettingsUpdate {
    pub fn interval(interval_ms: u64) -> Self {
        Self {
            interval_ms: Some(interval_ms),
            ..Self::default()
        }
    }

    pub fn sensitivity(sensitivity: u8) -> Self {
        Self {
            sensitivity: Some(sensitivity),
            ..Self::default()
        }
    }
}

impl CaptureSettings {
    pub fn new(interval_ms: u64, sensitivity: u8) -> Result<Self> {
        let settings = Self {
            interval_ms,
            sensitivity,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms < MIN_INTERVAL_MS {
            return Err(RoiscanError::invalid_settings(format!(
                "interval must be at least {}ms, got {}ms",
                MIN_INTERVAL_MS, self.interval_ms
            )));
        }

        if !(1..=100).contains(&self.sensitivity) {
            return Err(RoiscanError::invalid_settings(format!(
                "sensitivity must be between 1 and 100, got {}",
                self.sensitivity
            )));
        }

        Ok(())
    }

    /// Apply `update` on top of these settings, validating the result
    pub fn merged(&self, update: CaptureSettingsUpdate) -> Result<Self> {
        let merged = Self {
            interval_ms: update.interval_ms.unwrap_or(self.interval_ms),
            sensitivity: update.sensitivity.unwrap_or(self.sensitivity),
        };
        merged.validate()?;
        Ok(merged)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            sensitivity: 50,
        }
    }
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            interval_ms: config.interval_ms,
            sensitivity: config.sensitivity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let settings = CaptureSettings::default();

        let merged = settings.merged(CaptureSettingsUpdate::interval(250)).unwrap();
        assert_eq!(merged.interval_ms, 250);
        assert_eq!(merged.sensitivity, 50);

        let merged = merged.merged(CaptureSettingsUpdate::sensitivity(90)).unwrap();
        assert_eq!(merged.interval_ms, 250);
        assert_eq!(merged.sensitivity, 90);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = CaptureSettings::default();

        assert!(settings.merged(CaptureSettingsUpdate::interval(0)).is_err());
        assert!(settings.merged(CaptureSettingsUpdate::sensitivity(0)).is_err());
        assert!(settings.merged(CaptureSettingsUpdate::sensitivity(101)).is_err());
        assert!(CaptureSettings::new(MIN_INTERVAL_MS, 1).is_ok());
    }
}
