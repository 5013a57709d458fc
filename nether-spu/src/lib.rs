//! Software model of the Nethercore SPU
//!
//! Implements [`nether_stream::SoundDevice`] over 512 KiB of sample RAM and 24
//! voices, with the position-trigger and transfer-complete interrupts. Sample
//! data is never decoded; the model tracks which block each voice is reading,
//! which is all the streaming engine depends on.
//!
//! - [`Spu`] - the device; time advances via [`Spu::advance`] or `wait_hint`
//! - [`SpuClock`] - drives an [`Spu`] in real time from its own thread
//! - [`synthesize`] - builds `VAGi` assets with per-block chunk markers
//!
//! The model also counts torn reads (a voice fetching a block that a transfer
//! is still writing), which is how missed real-time deadlines show up.

mod asset;
mod block;
mod clock;
mod config;
mod spu;
mod voice;

pub use asset::{SynthError, SynthParams, channel_marker, chunk_marker, synthesize};
pub use block::{BlockFlags, silent_block};
pub use clock::SpuClock;
pub use config::SpuConfig;
pub use spu::{Spu, SpuStats, TRANSFER_LOG_CAPACITY, TransferRecord, TriggerState};
pub use voice::VoiceSnapshot;
