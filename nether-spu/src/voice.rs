//! Voice playback state

use nether_stream::device::SPU_RAM_SIZE;
use nether_stream::{Envelope, Volume};

use crate::block::{BLOCK_SIZE, BlockFlags, SAMPLES_PER_BLOCK, block_base};

/// Pitch units in one block: 28 samples at 4.12 fixed point
const BLOCK_PHASE: u32 = SAMPLES_PER_BLOCK << 12;

/// Wrap an address into sample RAM, aligned to its block
pub(crate) fn ram_block(addr: u32) -> u32 {
    block_base(addr) & (SPU_RAM_SIZE - 1)
}

/// Point-in-time copy of one voice's registers and position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceSnapshot {
    pub keyed_on: bool,
    pub start_addr: u32,
    pub loop_addr: u32,
    /// Block currently being played
    pub current_addr: u32,
    pub pitch: u16,
    pub envelope: Envelope,
    pub volume: Volume,
    /// Blocks fetched since power-on
    pub blocks_fetched: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Voice {
    pub start_addr: u32,
    pub loop_addr: u32,
    pub pitch: u16,
    pub envelope: Envelope,
    pub volume: Volume,
    keyed_on: bool,
    current_addr: u32,
    /// Flags of the current block, captured when it was fetched
    flags: Option<BlockFlags>,
    /// Position inside the current block in 1/4096 samples
    phase: u32,
    blocks_fetched: u64,
}

impl Voice {
    /// Restart from the start address; returns the block fetched
    pub fn key_on(&mut self, ram: &[u8]) -> u32 {
        self.keyed_on = true;
        self.phase = 0;
        self.fetch(ram, self.start_addr)
    }

    pub fn key_off(&mut self) {
        self.keyed_on = false;
    }

    /// Advance one device tick; returns the block fetched, if any.
    ///
    /// The pitch register never exceeds four samples per tick, so at most one
    /// block boundary is crossed.
    pub fn tick(&mut self, ram: &[u8]) -> Option<u32> {
        if !self.keyed_on {
            return None;
        }
        self.phase += u32::from(self.pitch);
        if self.phase < BLOCK_PHASE {
            return None;
        }
        self.phase -= BLOCK_PHASE;

        let flags = self.flags.unwrap_or(BlockFlags::empty());
        let next = if flags.contains(BlockFlags::LOOP_END) {
            if !flags.contains(BlockFlags::LOOP_REPEAT) {
                // One-shot end: the voice releases.
                self.keyed_on = false;
                return None;
            }
            self.loop_addr
        } else {
            self.current_addr + BLOCK_SIZE
        };
        Some(self.fetch(ram, next))
    }

    fn fetch(&mut self, ram: &[u8], addr: u32) -> u32 {
        let block = ram_block(addr);
        let start = block as usize;
        let flags = BlockFlags::of(&ram[start..start + BLOCK_SIZE as usize]);
        if flags.contains(BlockFlags::LOOP_START) {
            self.loop_addr = block;
        }
        self.current_addr = block;
        self.flags = Some(flags);
        self.blocks_fetched += 1;
        block
    }

    pub fn snapshot(&self) -> VoiceSnapshot {
        VoiceSnapshot {
            keyed_on: self.keyed_on,
            start_addr: self.start_addr,
            loop_addr: self.loop_addr,
            current_addr: self.current_addr,
            pitch: self.pitch,
            envelope: self.envelope,
            volume: self.volume,
            blocks_fetched: self.blocks_fetched,
        }
    }
}
