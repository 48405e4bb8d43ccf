//! Configuration loading, validation and defaults for idle-sentry.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::{EventKind, default_reset_events};

/// Errors produced by configuration validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("timeout_seconds must be positive (got {0})")]
    InvalidTimeout(u64),

    #[error("warning_seconds must be positive (got {0})")]
    InvalidWarning(u64),

    #[error("warning_seconds ({warning}) must be less than timeout_seconds ({timeout})")]
    WarningNotBeforeTimeout { warning: u64, timeout: u64 },
}

/// Main configuration for the inactivity monitor.
///
/// Pure data; the lifecycle hooks live in [`crate::domain::Callbacks`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Total inactivity budget before logout, in seconds (default: 60).
    pub timeout_seconds: u64,

    /// Trailing portion of the budget during which the warning is shown,
    /// in seconds (default: 20). Must be less than `timeout_seconds`.
    pub warning_seconds: u64,

    /// Input events that count as activity and reset the window.
    pub reset_activity_events: Vec<EventKind>,

    /// Master switch; when false no timers are scheduled even if
    /// monitoring is started (default: true).
    pub enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            warning_seconds: 20,
            reset_activity_events: default_reset_events(),
            enabled: true,
        }
    }
}

impl MonitorConfig {
    /// Validate the timing invariants.
    ///
    /// Rejects non-positive durations and any configuration where the
    /// warning window does not fit strictly inside the timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }
        if self.warning_seconds == 0 {
            return Err(ConfigError::InvalidWarning(self.warning_seconds));
        }
        if self.warning_seconds >= self.timeout_seconds {
            return Err(ConfigError::WarningNotBeforeTimeout {
                warning: self.warning_seconds,
                timeout: self.timeout_seconds,
            });
        }
        Ok(())
    }

    /// Seconds of silence before the warning opens.
    pub fn warning_delay_seconds(&self) -> u64 {
        self.timeout_seconds - self.warning_seconds
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        // Try default config path
        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("idle-sentry").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// Merge a partial update onto this configuration.
    ///
    /// Returns the merged configuration without validating it; callers
    /// validate before applying so a rejected merge leaves the prior
    /// configuration untouched.
    #[must_use]
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        let mut merged = self.clone();
        if let Some(timeout) = update.timeout_seconds {
            merged.timeout_seconds = timeout;
        }
        if let Some(warning) = update.warning_seconds {
            merged.warning_seconds = warning;
        }
        if let Some(ref events) = update.reset_activity_events {
            merged.reset_activity_events = events.clone();
        }
        if let Some(enabled) = update.enabled {
            merged.enabled = enabled;
        }
        merged
    }
}

/// Partial configuration used by reconfiguration; unset fields keep
/// their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub timeout_seconds: Option<u64>,
    pub warning_seconds: Option<u64>,
    pub reset_activity_events: Option<Vec<EventKind>>,
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.timeout_seconds, 60);
        assert_eq!(config.warning_seconds, 20);
        assert_eq!(config.reset_activity_events.len(), 7);
        assert!(config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_warning_delay() {
        let config = MonitorConfig {
            timeout_seconds: 5,
            warning_seconds: 2,
            ..Default::default()
        };
        assert_eq!(config.warning_delay_seconds(), 3);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = MonitorConfig {
            timeout_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout(0)));
    }

    #[test]
    fn test_validate_rejects_zero_warning() {
        let config = MonitorConfig {
            warning_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidWarning(0)));
    }

    #[test]
    fn test_validate_rejects_warning_not_before_timeout() {
        let config = MonitorConfig {
            timeout_seconds: 20,
            warning_seconds: 20,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::WarningNotBeforeTimeout {
                warning: 20,
                timeout: 20,
            })
        );

        let config = MonitorConfig {
            timeout_seconds: 20,
            warning_seconds: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            timeout_seconds = 300
            warning_seconds = 30
            reset_activity_events = ["keydown", "click"]
            enabled = false
        "#;

        let config: MonitorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timeout_seconds, 300);
        assert_eq!(config.warning_seconds, 30);
        assert_eq!(
            config.reset_activity_events,
            vec![EventKind::from("keydown"), EventKind::from("click")]
        );
        assert!(!config.enabled);
    }

    #[test]
    fn test_merged_update() {
        let config = MonitorConfig::default();
        let update = ConfigUpdate {
            timeout_seconds: Some(120),
            ..Default::default()
        };

        let merged = config.merged(&update);
        assert_eq!(merged.timeout_seconds, 120);
        assert_eq!(merged.warning_seconds, 20);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_merged_update_can_break_invariant() {
        let config = MonitorConfig::default();
        let update = ConfigUpdate {
            warning_seconds: Some(90),
            ..Default::default()
        };

        // Merge succeeds, validation of the merged result does not.
        let merged = config.merged(&update);
        assert!(merged.validate().is_err());
        assert!(config.validate().is_ok());
    }
}
