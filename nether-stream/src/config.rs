//! Stream configuration
//!
//! Device memory layout and the bound on the priming wait. Serialized as TOML
//! so tools can embed it in their own config files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::{BLOCK_SIZE, SPU_RAM_SIZE};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StreamConfig {
    /// Where the inert block and buffer sets live in sample RAM
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Bound on waiting for a priming transfer
    #[serde(default)]
    pub priming: PrimingConfig,
}

/// Sample RAM layout.
///
/// The first 4 KiB are reserved for capture buffers and a 16-byte inert block
/// follows at `0x1000`; the two buffer sets start right after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Silent looping block idle voices are parked on (default: 0x1000)
    #[serde(default = "default_dummy_block_addr")]
    pub dummy_block_addr: u32,
    /// Start of the first buffer set (default: 0x1010)
    #[serde(default = "default_buffer_start_addr")]
    pub buffer_start_addr: u32,
    /// Sample RAM size; at most the device's 512 KiB (default: 512 KiB)
    #[serde(default = "default_ram_size")]
    pub ram_size: u32,
}

/// Bound on the busy-wait for a priming transfer.
///
/// Zero disables a limit; with both at zero the wait is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimingConfig {
    /// Give up after this many wait iterations (default: 0, no limit)
    #[serde(default)]
    pub max_spins: u64,
    /// Give up after this many milliseconds (default: 1000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_dummy_block_addr() -> u32 {
    0x1000
}
fn default_buffer_start_addr() -> u32 {
    0x1010
}
fn default_ram_size() -> u32 {
    SPU_RAM_SIZE
}
fn default_timeout_ms() -> u64 {
    1000
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            dummy_block_addr: default_dummy_block_addr(),
            buffer_start_addr: default_buffer_start_addr(),
            ram_size: default_ram_size(),
        }
    }
}

impl Default for PrimingConfig {
    fn default() -> Self {
        Self {
            max_spins: 0,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl PrimingConfig {
    /// No limit; waits forever if the completion interrupt is lost
    pub fn unbounded() -> Self {
        Self {
            max_spins: 0,
            timeout_ms: 0,
        }
    }

    pub fn spin_limit(&self) -> Option<u64> {
        (self.max_spins > 0).then_some(self.max_spins)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Errors loading or validating a [`StreamConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl StreamConfig {
    /// Parse from TOML and validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;
        if layout.dummy_block_addr % 8 != 0 || layout.buffer_start_addr % 8 != 0 {
            return Err(ConfigError::Invalid(
                "sample RAM addresses must be 8-byte aligned".to_string(),
            ));
        }
        if layout.ram_size > SPU_RAM_SIZE {
            return Err(ConfigError::Invalid(format!(
                "ram_size {:#x} exceeds the device's {:#x} bytes of sample RAM",
                layout.ram_size, SPU_RAM_SIZE
            )));
        }
        let dummy_end = u64::from(layout.dummy_block_addr) + u64::from(BLOCK_SIZE);
        if dummy_end > u64::from(layout.ram_size) {
            return Err(ConfigError::Invalid(format!(
                "inert block at {:#x} is outside {:#x} bytes of sample RAM",
                layout.dummy_block_addr, layout.ram_size
            )));
        }
        if dummy_end > u64::from(layout.buffer_start_addr) {
            return Err(ConfigError::Invalid(format!(
                "buffer_start_addr {:#x} overlaps the inert block at {:#x}",
                layout.buffer_start_addr, layout.dummy_block_addr
            )));
        }
        if layout.buffer_start_addr >= layout.ram_size {
            return Err(ConfigError::Invalid(format!(
                "buffer_start_addr {:#x} is outside {:#x} bytes of sample RAM",
                layout.buffer_start_addr, layout.ram_size
            )));
        }
        Ok(())
    }
}
