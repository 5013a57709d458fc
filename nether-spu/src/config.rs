//! SPU model configuration

use serde::{Deserialize, Serialize};

/// Timing and fault-injection knobs for [`crate::Spu`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpuConfig {
    /// Device ticks between `begin_transfer` and its completion (default: 512)
    #[serde(default = "default_transfer_latency_ticks")]
    pub transfer_latency_ticks: u64,
    /// Ticks advanced by each `wait_hint`; 0 only yields the thread (default: 64)
    #[serde(default = "default_idle_ticks")]
    pub idle_ticks: u64,
    /// Where the inert looping block is written at power-on (default: 0x1000)
    #[serde(default = "default_inert_block_addr")]
    pub inert_block_addr: u32,
    /// Swallow transfer-complete interrupts (default: false)
    #[serde(default)]
    pub drop_completions: bool,
}

fn default_transfer_latency_ticks() -> u64 {
    512
}
fn default_idle_ticks() -> u64 {
    64
}
fn default_inert_block_addr() -> u32 {
    0x1000
}

impl Default for SpuConfig {
    fn default() -> Self {
        Self {
            transfer_latency_ticks: default_transfer_latency_ticks(),
            idle_ticks: default_idle_ticks(),
            inert_block_addr: default_inert_block_addr(),
            drop_completions: false,
        }
    }
}
