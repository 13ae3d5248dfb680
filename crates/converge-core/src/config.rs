//! Configuration for the converger and the simulator binary

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Converge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergeConfig {
    /// Maximum resource checks running at once
    pub max_concurrent_checks: usize,
    /// Upper bound of the simulated provisioning delay in milliseconds
    pub check_delay_ms: u64,
    /// Seed for simulated delays
    pub seed: u64,
    /// Default tracing filter directive
    pub log_filter: String,
}

impl ConvergeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max concurrent checks
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_checks(mut self, max: usize) -> Self {
        self.max_concurrent_checks = max;
        self
    }

    /// With simulated delay bound
    #[inline]
    #[must_use]
    pub fn with_check_delay_ms(mut self, delay_ms: u64) -> Self {
        self.check_delay_ms = delay_ms;
        self
    }

    /// With seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// With log filter
    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Parse configuration from TOML; missing fields keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_checks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_checks",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: 8,
            check_delay_ms: 0,
            seed: 42,
            log_filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConvergeConfig::new();

        assert_eq!(config.max_concurrent_checks, 8);
        assert_eq!(config.check_delay_ms, 0);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ConvergeConfig::from_toml_str("check_delay_ms = 25\nseed = 7\n").unwrap();

        assert_eq!(config.check_delay_ms, 25);
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_concurrent_checks, 8);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = ConvergeConfig::from_toml_str("max_concurrent_checks = 0").unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "max_concurrent_checks",
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            ConvergeConfig::from_toml_str("seed = \"not a number\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn builders_chain() {
        let config = ConvergeConfig::new()
            .with_max_concurrent_checks(2)
            .with_check_delay_ms(5)
            .with_seed(9)
            .with_log_filter("debug");

        assert_eq!(config.max_concurrent_checks, 2);
        assert_eq!(config.check_delay_ms, 5);
        assert_eq!(config.seed, 9);
        assert_eq!(config.log_filter, "debug");
    }
}
