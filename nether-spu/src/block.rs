//! ADPCM block layout
//!
//! ```text
//! byte 0      shift/filter (ignored by the model)
//! byte 1      flags
//! bytes 2-15  28 packed 4-bit samples
//! ```

pub use nether_stream::device::{BLOCK_SIZE, SAMPLES_PER_BLOCK};

/// Offset of the flag byte within a block
pub const FLAGS_OFFSET: usize = 1;

bitflags::bitflags! {
    /// Loop control flags carried by every ADPCM block
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// Jump to the loop address after this block
        const LOOP_END = 0b0000_0001;
        /// Keep playing after the jump; without it the voice is released
        const LOOP_REPEAT = 0b0000_0010;
        /// Latch this block as the loop address when fetched
        const LOOP_START = 0b0000_0100;
    }
}

impl BlockFlags {
    /// Flags of the inert block: loops onto itself forever
    pub const INERT: Self = Self::LOOP_END.union(Self::LOOP_REPEAT).union(Self::LOOP_START);

    /// Flags of `block`; unknown bits are dropped
    pub fn of(block: &[u8]) -> Self {
        block
            .get(FLAGS_OFFSET)
            .map_or(Self::empty(), |&bits| Self::from_bits_truncate(bits))
    }
}

/// A silent block with the given flags
pub fn silent_block(flags: BlockFlags) -> [u8; BLOCK_SIZE as usize] {
    let mut block = [0u8; BLOCK_SIZE as usize];
    block[FLAGS_OFFSET] = flags.bits();
    block
}

/// Align `addr` down to its block
pub fn block_base(addr: u32) -> u32 {
    addr & !(BLOCK_SIZE - 1)
}
