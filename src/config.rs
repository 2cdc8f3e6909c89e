//! Configuration for the contention monitor.
//!
//! YAML on disk, every key optional. Precedence: CLI > file > defaults.
//! [`Config::validate`] is run before any poll loop starts.

use crate::error::{MonitorError, Result};
use crate::log_warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Polling cadence and tick size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between poll iterations in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Simulated seconds added per evaluated sample.
    #[serde(default = "default_tick_size_secs")]
    pub tick_size_secs: f64,
}

fn default_interval_ms() -> u64 {
    1000
}
fn default_tick_size_secs() -> f64 {
    1.0
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms(), tick_size_secs: default_tick_size_secs() }
    }
}

/// Wait-tick thresholds for contention classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Waits strictly above this are a WARNING.
    #[serde(default = "default_warning")]
    pub warning: f64,

    /// Waits strictly above this are an ERROR.
    #[serde(default = "default_error")]
    pub error: f64,
}

fn default_warning() -> f64 {
    30.0
}
fn default_error() -> f64 {
    60.0
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { warning: default_warning(), error: default_error() }
    }
}

/// Synthetic circular-wait fault injector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultInjectorConfig {
    /// Whether the injector runs at all.
    #[serde(default)]
    pub enabled: bool,

    /// Open interval `(start, end)` of elapsed seconds in which faults may fire.
    #[serde(default = "default_window")]
    pub window: (f64, f64),

    /// Per-tick firing probability inside the window.
    #[serde(default = "default_probability")]
    pub probability: f64,

    /// Candidate resource pairs, one picked uniformly per fired fault.
    #[serde(default = "default_pairs")]
    pub pairs: Vec<(String, String)>,
}

fn default_window() -> (f64, f64) {
    (15.0, 17.0)
}
fn default_probability() -> f64 {
    0.5
}
fn default_pairs() -> Vec<(String, String)> {
    [
        ("Lock-A (UserDB)", "Lock-X (Cache_Write)"),
        ("Socket (192.168.1.10:5432)", "Lock-A (UserDB)"),
        ("Pipe-B (Input_Feed)", "Lock-X (Cache_Write)"),
    ]
    .into_iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
}

impl Default for FaultInjectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: default_window(),
            probability: default_probability(),
            pairs: default_pairs(),
        }
    }
}

/// Settings for the built-in synthetic sampler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Include established TCP connections as contention entries.
    #[serde(default)]
    pub live_sockets: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Seed for every random source (fault injector, synthetic sampler).
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// Polling settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Classification thresholds.
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Fault injector settings.
    #[serde(default)]
    pub fault_injector: FaultInjectorConfig,

    /// Synthetic sampler settings.
    #[serde(default)]
    pub sampler: SamplerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            rng_seed: None,
            polling: PollingConfig::default(),
            thresholds: ThresholdConfig::default(),
            fault_injector: FaultInjectorConfig::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with the fault injector switched on.
    #[must_use]
    pub fn demo() -> Self {
        let mut config = Self::default();
        config.fault_injector.enabled = true;
        config
    }

    /// Default location: `<config_dir>/contention-monitor/config.yaml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("contention-monitor").join("config.yaml"))
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| MonitorError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error with line number if parsing fails.
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map_or(0, |l| l.line());
            MonitorError::ConfigParse { line, message: e.to_string() }
        })
    }

    /// Loads configuration with fallback to defaults.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(MonitorError::ConfigNotFound(_)) => Self::default(),
            Err(e) => {
                log_warn!("config", "ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Serializes the configuration back to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| MonitorError::ConfigParse { line: 0, message: e.to_string() })
    }

    /// Returns the polling interval as a Duration.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    /// Checks every cross-field rule.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidConfig`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(MonitorError::invalid_config("polling.interval_ms", "must be positive"));
        }
        validate_tick_size(self.polling.tick_size_secs)?;
        validate_thresholds(&self.thresholds)?;
        validate_fault_injector(&self.fault_injector)
    }
}

/// Tick size must be a positive, finite number of seconds.
pub(crate) fn validate_tick_size(tick_size_secs: f64) -> Result<()> {
    if !tick_size_secs.is_finite() || tick_size_secs <= 0.0 {
        return Err(MonitorError::invalid_config(
            "polling.tick_size_secs",
            format!("must be positive and finite, got {tick_size_secs}"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_thresholds(t: &ThresholdConfig) -> Result<()> {
    if !t.warning.is_finite() || !t.error.is_finite() {
        return Err(MonitorError::invalid_config("thresholds", "must be finite"));
    }
    if t.warning >= t.error {
        return Err(MonitorError::invalid_config(
            "thresholds.warning",
            format!("must be below error threshold ({} >= {})", t.warning, t.error),
        ));
    }
    Ok(())
}

pub(crate) fn validate_fault_injector(f: &FaultInjectorConfig) -> Result<()> {
    if !f.enabled {
        return Ok(());
    }
    if f.pairs.is_empty() {
        return Err(MonitorError::invalid_config(
            "fault_injector.pairs",
            "must not be empty while the injector is enabled",
        ));
    }
    if !(0.0..=1.0).contains(&f.probability) {
        return Err(MonitorError::invalid_config(
            "fault_injector.probability",
            format!("must be within 0..=1, got {}", f.probability),
        ));
    }
    let (start, end) = f.window;
    if !start.is_finite() || !end.is_finite() || start >= end {
        return Err(MonitorError::invalid_config(
            "fault_injector.window",
            format!("start must be below end, got ({start}, {end})"),
        ));
    }
    Ok(())
}
