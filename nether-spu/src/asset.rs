//! Synthetic `VAGi` stream assets
//!
//! Builds silent streams whose blocks are stamped with their chunk and channel
//! index, so playback order can be read back from sample RAM. The last block
//! of every channel buffer carries loop-end|repeat, which hands each voice
//! over to the other buffer set.
//!
//! Block layout (16 bytes):
//!
//! ```text
//! 0      shift/filter = 0
//! 1      flags
//! 2-5    chunk index (u32 LE)
//! 6      channel index
//! 7-15   zero (silence)
//! ```

use byteorder::{ByteOrder, LittleEndian};
use nether_stream::{AssetHeader, HEADER_REGION_SIZE, VOICE_COUNT};

use crate::block::{BLOCK_SIZE, BlockFlags, FLAGS_OFFSET};

const MARKER_OFFSET: usize = 2;
const CHANNEL_OFFSET: usize = 6;

/// Shape of a synthesized stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthParams {
    /// Bytes per channel per chunk
    pub interleave: u32,
    pub chunk_count: u32,
    pub sample_rate: u32,
    /// 0 is written as-is and read back as mono
    pub channels: u16,
    pub name: String,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            interleave: 4096,
            chunk_count: 22,
            sample_rate: 44_100,
            channels: 2,
            name: "synth".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SynthError {
    #[error("interleave must be a non-zero multiple of {block} bytes, got {0}", block = BLOCK_SIZE)]
    Interleave(u32),

    #[error("a stream needs at least one chunk")]
    NoChunks,

    #[error("{0} channels requested, the device has {max} voices", max = VOICE_COUNT)]
    TooManyChannels(u16),

    #[error("stream of {0} bytes is too large for the header")]
    TooLarge(u64),
}

/// Build a complete asset: header region followed by the chunk payload
pub fn synthesize(params: &SynthParams) -> Result<Vec<u8>, SynthError> {
    if params.interleave == 0 || params.interleave % BLOCK_SIZE != 0 {
        return Err(SynthError::Interleave(params.interleave));
    }
    if params.chunk_count == 0 {
        return Err(SynthError::NoChunks);
    }
    if usize::from(params.channels) > VOICE_COUNT {
        return Err(SynthError::TooManyChannels(params.channels));
    }
    let total = u64::from(params.interleave) * u64::from(params.chunk_count);
    let total_size = u32::try_from(total).map_err(|_| SynthError::TooLarge(total))?;

    let header = AssetHeader::new(
        params.interleave,
        total_size,
        params.sample_rate,
        params.channels,
    )
    .with_name(&params.name);

    let channels = params.channels.max(1);
    let blocks_per_buffer = (params.interleave / BLOCK_SIZE) as usize;
    let payload_len = total as usize * usize::from(channels);

    let mut asset = Vec::with_capacity(HEADER_REGION_SIZE + payload_len);
    asset.extend_from_slice(&header.to_bytes());
    asset.resize(HEADER_REGION_SIZE, 0);

    for chunk in 0..params.chunk_count {
        for channel in 0..channels {
            for index in 0..blocks_per_buffer {
                let flags = if index + 1 == blocks_per_buffer {
                    BlockFlags::LOOP_END | BlockFlags::LOOP_REPEAT
                } else {
                    BlockFlags::empty()
                };
                asset.extend_from_slice(&stamped_block(chunk, channel as u8, flags));
            }
        }
    }
    Ok(asset)
}

fn stamped_block(chunk: u32, channel: u8, flags: BlockFlags) -> [u8; BLOCK_SIZE as usize] {
    let mut block = [0u8; BLOCK_SIZE as usize];
    block[FLAGS_OFFSET] = flags.bits();
    LittleEndian::write_u32(&mut block[MARKER_OFFSET..MARKER_OFFSET + 4], chunk);
    block[CHANNEL_OFFSET] = channel;
    block
}

/// Chunk index stamped into a synthesized block
pub fn chunk_marker(block: &[u8]) -> Option<u32> {
    block
        .get(MARKER_OFFSET..MARKER_OFFSET + 4)
        .map(LittleEndian::read_u32)
}

/// Channel index stamped into a synthesized block
pub fn channel_marker(block: &[u8]) -> Option<u8> {
    block.get(CHANNEL_OFFSET).copied()
}
