//! Tool configuration
//!
//! Every timing constant and limit of the tool lives here with its bench
//! default. A TOML file may override any subset of keys:
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyACM0"
//!
//! [monitor]
//! buffer_capacity = 200
//! log_file = "session.log"
//! ```

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "emg-probe.toml";

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub serial: SerialSettings,
    pub exchange: ExchangeSettings,
    pub monitor: MonitorSettings,
    pub calibration: CalibrationSettings,
    pub plot: PlotSettings,
}

/// Serial link and port discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Explicit port path; skips discovery when set
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    /// Delay after opening, lets the board finish its reset
    pub settle_ms: u64,
    /// Case-sensitive substrings matched against port descriptions
    pub match_patterns: Vec<String>,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            timeout_ms: 1000,
            settle_ms: 2000,
            match_patterns: vec!["Arduino".to_string(), "CH340".to_string(), "USB".to_string()],
        }
    }
}

impl SerialSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Command/response exchange bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub window_ms: u64,
    pub poll_interval_ms: u64,
    pub max_lines: usize,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            window_ms: 5000,
            poll_interval_ms: 500,
            max_lines: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_ms: u64,
    pub buffer_capacity: usize,
    /// Append every received line to this file
    pub log_file: Option<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            buffer_capacity: 100,
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Length of the contraction measurement window
    pub measure_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            measure_ms: 5000,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            width: 1200,
            height: 800,
        }
    }
}

impl ProbeConfig {
    /// Load and validate a configuration file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProbeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let config: ProbeConfig = toml::from_str(&content)
            .map_err(|e| ProbeError::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for this run: an explicit path must exist,
    /// the implicit `emg-probe.toml` is optional.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ProbeError> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILE);
                if implicit.is_file() {
                    log::info!("Using configuration from {}", implicit.display());
                    Self::load_from_file(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, ProbeError> {
        toml::to_string_pretty(self).map_err(|e| ProbeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.serial.baud_rate == 0 {
            return Err(ProbeError::Config("serial.baud_rate must be positive".to_string()));
        }
        if self.serial.match_patterns.iter().any(|p| p.is_empty()) {
            return Err(ProbeError::Config(
                "serial.match_patterns must not contain empty patterns".to_string(),
            ));
        }
        if self.exchange.poll_interval_ms == 0 || self.calibration.poll_interval_ms == 0 {
            return Err(ProbeError::Config("poll intervals must be positive".to_string()));
        }
        if self.exchange.max_lines == 0 {
            return Err(ProbeError::Config("exchange.max_lines must be positive".to_string()));
        }
        if self.monitor.buffer_capacity == 0 {
            return Err(ProbeError::Config("monitor.buffer_capacity must be positive".to_string()));
        }
        if self.plot.width == 0 || self.plot.height == 0 {
            return Err(ProbeError::Config("plot dimensions must be positive".to_string()));
        }
        Ok(())
    }
}
