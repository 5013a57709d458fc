//! Player configuration
//!
//! Loaded from `--config` when given, otherwise from `player.toml` in the
//! platform config directory. A missing default file means defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use nether_spu::SpuConfig;
use nether_stream::StreamConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

const CONFIG_FILE: &str = "player.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerConfig {
    /// Engine layout and priming bound
    #[serde(default)]
    pub stream: StreamConfig,
    /// SPU model timing
    #[serde(default)]
    pub spu: SpuConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// How often to print the stream status (default: 250)
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Device time per wall-clock time (default: 1.0)
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Clock thread wake-up interval (default: 5)
    #[serde(default = "default_quantum_ms")]
    pub quantum_ms: u64,
}

fn default_status_interval_ms() -> u64 {
    250
}
fn default_speed() -> f64 {
    1.0
}
fn default_quantum_ms() -> u64 {
    5
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval_ms(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            quantum_ms: default_quantum_ms(),
        }
    }
}

/// Platform config directory for the player
///
/// On Linux: `~/.config/nether-stream`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.nethercore", "", "nether-stream")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

impl PlayerConfig {
    /// Load from `path`, or from the config directory when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match config_dir().map(|dir| dir.join(CONFIG_FILE)) {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No player config found, using defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!("Loaded player config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;
        if !(self.clock.speed.is_finite() && self.clock.speed > 0.0) {
            bail!("clock.speed must be positive, got {}", self.clock.speed);
        }
        if self.clock.quantum_ms == 0 {
            bail!("clock.quantum_ms must be at least 1");
        }
        if self.display.status_interval_ms == 0 {
            bail!("display.status_interval_ms must be at least 1");
        }
        Ok(())
    }
}
