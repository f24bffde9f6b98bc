//! # Configuration
//!
//! Settings of the periodic executor and of logging. Every field has a
//! default, so an empty file (or no file at all) yields a working
//! configuration.
//!
//! ```rust,no_run
//! use confctl_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("config/controller.toml")?;
//! let period = manager.config().executor.period();
//! # let _ = period;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::executor as defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration of the controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}

impl ControllerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.executor.validate()
    }
}

/// Settings of the periodic executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Disabled executors skip every tick
    pub enabled: bool,
    pub period_ms: u64,
    /// Offset applied to slot starts; negative values start ahead of the slot
    pub start_offset_seconds: i64,
    /// Offset applied to slot ends; positive values stop after the slot
    pub end_offset_seconds: i64,
    pub room_settle_ms: u64,
    pub retry_delay_seconds: i64,
    pub max_attempt_count: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: defaults::DEFAULT_PERIOD_MS,
            start_offset_seconds: defaults::DEFAULT_START_OFFSET_SECONDS,
            end_offset_seconds: defaults::DEFAULT_END_OFFSET_SECONDS,
            room_settle_ms: defaults::DEFAULT_ROOM_SETTLE_MS,
            retry_delay_seconds: defaults::DEFAULT_RETRY_DELAY_SECONDS,
            max_attempt_count: defaults::DEFAULT_MAX_ATTEMPT_COUNT,
        }
    }
}

impl ExecutorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn start_offset(&self) -> chrono::Duration {
        bounded_seconds(self.start_offset_seconds)
    }

    pub fn end_offset(&self) -> chrono::Duration {
        bounded_seconds(self.end_offset_seconds)
    }

    pub fn room_settle(&self) -> Duration {
        Duration::from_millis(self.room_settle_ms)
    }

    pub fn retry_delay(&self) -> chrono::Duration {
        bounded_seconds(self.retry_delay_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.period_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.period_ms",
                self.period_ms,
                "period must be greater than 0",
            ));
        }

        if self.max_attempt_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.max_attempt_count",
                self.max_attempt_count,
                "at least one attempt is required",
            ));
        }

        for (field, value) in [
            ("executor.start_offset_seconds", self.start_offset_seconds),
            ("executor.end_offset_seconds", self.end_offset_seconds),
            ("executor.retry_delay_seconds", self.retry_delay_seconds),
        ] {
            if !(-defaults::MAX_DURATION_SECONDS..=defaults::MAX_DURATION_SECONDS).contains(&value) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    format!("must be within {} seconds", defaults::MAX_DURATION_SECONDS),
                ));
            }
        }

        if self.retry_delay_seconds < 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.retry_delay_seconds",
                self.retry_delay_seconds,
                "retry delay cannot be negative",
            ));
        }

        // A window closing before it opens would never select anything to run
        if self.end_offset_seconds < self.start_offset_seconds {
            return Err(ConfigurationError::invalid_value(
                "executor.end_offset_seconds",
                self.end_offset_seconds,
                "end offset must not precede the start offset",
            ));
        }

        Ok(())
    }
}

fn bounded_seconds(seconds: i64) -> chrono::Duration {
    let bound = defaults::MAX_DURATION_SECONDS;
    chrono::Duration::seconds(seconds.clamp(-bound, bound))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; derived from the environment when absent
    pub level: Option<String>,
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.executor.enabled);
        assert_eq!(config.executor.period(), Duration::from_secs(10));
        assert_eq!(config.executor.start_offset(), chrono::Duration::seconds(-30));
        assert_eq!(config.executor.max_attempt_count, 5);
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let config = ExecutorConfig {
            period_ms: 0,
            ..ExecutorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { field, .. }) if field == "executor.period_ms"
        ));
    }

    #[test]
    fn test_inverted_offsets_are_rejected() {
        let config = ExecutorConfig {
            start_offset_seconds: 60,
            end_offset_seconds: -60,
            ..ExecutorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_durations_are_rejected() {
        let config = ExecutorConfig {
            retry_delay_seconds: i64::MAX,
            ..ExecutorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { field, .. }) if field == "executor.retry_delay_seconds"
        ));
        assert_eq!(
            config.retry_delay(),
            chrono::Duration::seconds(defaults::MAX_DURATION_SECONDS)
        );

        let config = ExecutorConfig {
            start_offset_seconds: i64::MIN,
            ..ExecutorConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(
            config.start_offset(),
            chrono::Duration::seconds(-defaults::MAX_DURATION_SECONDS)
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"executor": {"enabled": false}}"#).unwrap();
        assert!(!config.executor.enabled);
        assert_eq!(config.executor.period_ms, 10_000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
