//! Run configuration for stepwatch
//!
//! TOML-based configuration with defaults and validation.
//! Location: ~/.stepwatch/config.toml

use crate::errors::{Result, SupervisorError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Quantity whose steady state decides termination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    /// Integrated heat release rate
    HeatRelease,
    /// Peak temperature
    Temperature,
}

impl Measurement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Measurement::HeatRelease => "heat_release",
            Measurement::Temperature => "temperature",
        }
    }
}

/// When a run is considered complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationCondition {
    /// `None` runs to `t_end`; `Some` runs until the measurement is steady
    #[serde(default)]
    pub measurement: Option<Measurement>,
    pub t_end: f64,
    pub steady_period: f64,
    pub tolerance: f64,
}

/// Worker loop tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Recompute progress every N steps
    pub progress_interval: u32,
    /// Sleep after each step so the monitor can take the lock
    pub yield_interval_us: u64,
}

/// Status monitor tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
}

/// Complete configuration for one supervised run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub termination: TerminationCondition,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            termination: TerminationCondition::default(),
            worker: WorkerConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Default for TerminationCondition {
    fn default() -> Self {
        Self {
            measurement: Some(Measurement::HeatRelease),
            t_end: 0.8,
            steady_period: 0.002,
            tolerance: 1e-4,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            progress_interval: 5,
            yield_interval_us: 100,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
        }
    }
}

impl WorkerConfig {
    pub fn yield_interval(&self) -> Duration {
        Duration::from_micros(self.yield_interval_us)
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl RunConfig {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(config_path) => Self::load_from_file(&config_path),
            None => Self::load_default(),
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SupervisorError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;

        let config: RunConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, falling back to built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(RunConfig::default())
    }

    /// `~/.stepwatch/config.toml`, if a home directory exists
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".stepwatch").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let tc = &self.termination;

        if !tc.t_end.is_finite() || tc.t_end <= 0.0 {
            return Err(SupervisorError::ConfigValidation(format!(
                "t_end must be a positive number, got {}",
                tc.t_end
            )));
        }

        if tc.measurement.is_some() {
            if !tc.steady_period.is_finite() || tc.steady_period <= 0.0 {
                return Err(SupervisorError::ConfigValidation(format!(
                    "steady_period must be a positive number, got {}",
                    tc.steady_period
                )));
            }

            // log10(tolerance) is the denominator of the convergence estimate
            if !(tc.tolerance > 0.0 && tc.tolerance < 1.0) {
                return Err(SupervisorError::ConfigValidation(format!(
                    "tolerance must be between 0 and 1 (exclusive), got {}",
                    tc.tolerance
                )));
            }
        }

        if self.worker.progress_interval == 0 {
            return Err(SupervisorError::ConfigValidation(
                "progress_interval must be at least 1".to_string(),
            ));
        }

        if self.monitor.poll_interval_ms == 0 {
            return Err(SupervisorError::ConfigValidation(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SupervisorError::ConfigIo {
                path: parent.display().to_string(),
                source,
            })?;
        }

        std::fs::write(path, contents).map_err(|source| SupervisorError::ConfigIo {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker.progress_interval, 5);
        assert_eq!(config.monitor.poll_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_validation_rejects_bad_t_end() {
        let mut config = RunConfig::default();
        config.termination.t_end = 0.0;
        assert!(matches!(
            config.validate(),
            Err(SupervisorError::ConfigValidation(_))
        ));

        config.termination.t_end = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_tolerance_range() {
        let mut config = RunConfig::default();
        config.termination.tolerance = 1.0;
        assert!(config.validate().is_err());

        config.termination.tolerance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_end_time_ignores_steady_settings() {
        let mut config = RunConfig::default();
        config.termination.measurement = None;
        config.termination.steady_period = 0.0;
        config.termination.tolerance = 5.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_intervals() {
        let mut config = RunConfig::default();
        config.worker.progress_interval = 0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.monitor.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_section_defaults() {
        let text = r#"
            [termination]
            t_end = 10.0
            steady_period = 1.0
            tolerance = 0.001
        "#;
        let config: RunConfig = toml::from_str(text).unwrap();
        assert_eq!(config.termination.measurement, None);
        assert_eq!(config.worker, WorkerConfig::default());
        assert_eq!(config.monitor, MonitorConfig::default());
    }

    #[test]
    fn test_measurement_serializes_snake_case() {
        let config = RunConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("heat_release"));
    }
}
