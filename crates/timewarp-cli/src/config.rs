//! TOML-based demo configuration.
//!
//! Stores the heartbeat task's curve parameters and the log file location.
//! Read from `~/.config/timewarp/config.toml` when present; every field has
//! a default so a partial (or missing) file works.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Curve name: linear, sinusoidal, exponential, logarithmic, or custom.
    #[serde(default = "default_curve")]
    pub curve: String,
    /// Curve period (ms).
    #[serde(default = "default_duration_ms")]
    pub duration_ms: f64,
    /// Base interval magnitude (ms).
    #[serde(default = "default_amplitude_ms")]
    pub amplitude_ms: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// File the demo appends one record per beat to.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

fn default_curve() -> String {
    "sinusoidal".to_string()
}

// 10 s period with 500-1000 ms intervals lands at 60-120 BPM.
fn default_duration_ms() -> f64 {
    10_000.0
}

fn default_amplitude_ms() -> f64 {
    1000.0
}

fn default_scale() -> f64 {
    1.2
}

fn default_log_path() -> PathBuf {
    PathBuf::from("heartbeats.log")
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            curve: default_curve(),
            duration_ms: default_duration_ms(),
            amplitude_ms: default_amplitude_ms(),
            scale: default_scale(),
            log_path: default_log_path(),
        }
    }
}

impl HeartbeatConfig {
    /// Default config file location (`~/.config/timewarp/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("timewarp").join("config.toml"))
    }

    /// Load from an explicit path (must exist), or from the default path if
    /// present, or fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = match path {
            Some(explicit) => explicit.to_path_buf(),
            None => match Self::default_path() {
                Some(default) if default.exists() => default,
                _ => return Ok(Self::default()),
            },
        };
        let contents = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }
}
