//! Client engine configuration
//!
//! Durations are configured in milliseconds so the TOML file stays flat:
//!
//! ```toml
//! threshold = 0.6
//! autoplay_debounce_ms = 250
//! persist_interval_ms = 5000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, Result};

/// Default visibility ratio at which a card counts as in view
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Scheduler and observer tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Intersection ratio that marks a card as visible, in (0, 1]
    pub threshold: f64,
    /// Delay before a visible card starts playing automatically
    pub autoplay_debounce_ms: u64,
    /// Period of resume-offset writes while audible
    pub persist_interval_ms: u64,
    /// Lifetime of the double-tap card flag
    pub double_tap_ttl_ms: u64,
    /// Upper bound on the resume-offset fetch before audio starts from 0
    pub resume_timeout_ms: u64,
    /// Capacity of the scheduler command queue
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            autoplay_debounce_ms: 250,
            persist_interval_ms: 5_000,
            double_tap_ttl_ms: 2_000,
            resume_timeout_ms: 2_000,
            queue_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    /// Parse a TOML file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        if self.persist_interval_ms == 0 {
            return Err(ClientError::Config("persist_interval_ms must be positive".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ClientError::Config("queue_capacity must be positive".to_string()));
        }
        Ok(())
    }

    pub fn autoplay_debounce(&self) -> Duration {
        Duration::from_millis(self.autoplay_debounce_ms)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }

    pub fn double_tap_ttl(&self) -> Duration {
        Duration::from_millis(self.double_tap_ttl_ms)
    }

    pub fn resume_timeout(&self) -> Duration {
        Duration::from_millis(self.resume_timeout_ms)
    }
}

/// Thresholds must satisfy `0 < t <= 1`
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        Ok(threshold)
    } else {
        Err(ClientError::InvalidInput(format!(
            "Visibility threshold must be in (0, 1], got {}",
            threshold
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.threshold, 0.6);
        assert_eq!(config.autoplay_debounce(), Duration::from_millis(250));
        assert_eq!(config.persist_interval(), Duration::from_secs(5));
        assert_eq!(config.double_tap_ttl(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(0.01).is_ok());
        assert!(validate_threshold(0.0).is_err());
        assert!(validate_threshold(1.5).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold = 0.75\npersist_interval_ms = 1000").unwrap();

        let config = SchedulerConfig::load(file.path()).unwrap();
        assert_eq!(config.threshold, 0.75);
        assert_eq!(config.persist_interval_ms, 1000);
        assert_eq!(config.autoplay_debounce_ms, 250);
    }

    #[test]
    fn test_load_rejects_bad_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold = 2.0").unwrap();
        assert!(SchedulerConfig::load(file.path()).is_err());
    }
}
