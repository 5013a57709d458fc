//! Nether Stream: chunked audio streaming for the Nethercore SPU
//!
//! Plays an interleaved ADPCM asset that is far larger than SPU sample RAM by
//! keeping two chunk-sized buffer sets resident and swapping them under
//! interrupt control.
//!
//! # Architecture
//!
//! ```text
//! control loop            SPU (position IRQ)           SPU (transfer IRQ)
//!     │                         │                            │
//! [initialize]──prime──►[load_next_chunk]──DMA──────►[complete_transfer]
//! [start]─────key-on,prime──►   │                            │ re-arm
//!     │                  playback reaches watch addr ◄───────┘
//! [status] (read-only)   [load_next_chunk] ...
//! ```
//!
//! - [`AssetHeader`] - `VAGi` header parsing and geometry validation
//! - [`StreamEngine`] - owns the stream state; `initialize`, `start`, `stop`
//! - [`SoundDevice`] - register-level seam to the playback hardware
//! - [`reset_voices`] - parks every voice on the inert block at bring-up
//!
//! The payload is never decoded; chunks are copied to the device as-is.

pub mod config;
mod controller;
pub mod device;
mod error;
pub mod header;
mod loader;
mod reset;
mod state;
#[cfg(test)]
pub mod test_utils;

pub use config::{ConfigError, LayoutConfig, PrimingConfig, StreamConfig};
pub use controller::StreamEngine;
pub use device::{
    Envelope, Interrupt, InterruptHandler, SoundDevice, VOICE_COUNT, VoiceMask, Volume,
    pitch_for_rate,
};
pub use error::{InvalidAsset, StreamError};
pub use header::{AssetHeader, HEADER_REGION_SIZE, StreamGeometry};
pub use reset::reset_voices;
pub use state::{IrqLatch, StreamStatus};
