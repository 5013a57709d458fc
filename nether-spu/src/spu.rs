//! The SPU model
//!
//! Time advances in device ticks, one per output sample at 44.1 kHz. Each tick
//! steps every keyed-on voice, then the in-flight transfer. Interrupts raised
//! during a tick are dispatched after the model lock is released, one at a
//! time, so handlers can issue register writes freely.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use nether_stream::device::SPU_RAM_SIZE;
use nether_stream::{
    Envelope, Interrupt, InterruptHandler, SoundDevice, VOICE_COUNT, VoiceMask, Volume,
};
use tracing::{debug, trace, warn};

use crate::block::{BLOCK_SIZE, BlockFlags, block_base, silent_block};
use crate::config::SpuConfig;
use crate::voice::{Voice, VoiceSnapshot, ram_block};

/// Entries kept in the transfer log
pub const TRANSFER_LOG_CAPACITY: usize = 256;

/// Counters for everything the model observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpuStats {
    pub ticks: u64,
    pub triggers_raised: u64,
    pub transfers_started: u64,
    pub transfers_completed: u64,
    /// Completion interrupts swallowed by fault injection
    pub completions_dropped: u64,
    /// Block fetches that hit a transfer still in flight
    pub torn_reads: u64,
    /// Transfers started while another was in flight
    pub transfer_overruns: u64,
}

/// One `begin_transfer` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub addr: u32,
    pub len: usize,
    /// Tick at which the transfer started
    pub tick: u64,
    /// Copy of the first block of data, zero padded
    pub first_block: [u8; BLOCK_SIZE as usize],
}

/// Position-trigger registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerState {
    pub enabled: bool,
    pub addr: u32,
    /// Raised and not yet acknowledged by disabling
    pub latched: bool,
}

struct Transfer {
    addr: u32,
    data: Vec<u8>,
    remaining_ticks: u64,
}

impl Transfer {
    /// True if the block at `block` overlaps the destination range
    fn covers(&self, block: u32) -> bool {
        let start = u64::from(self.addr);
        let end = start + self.data.len() as u64;
        let block = u64::from(block);
        block < end && block + u64::from(BLOCK_SIZE) > start
    }
}

struct SpuCore {
    config: SpuConfig,
    ram: Vec<u8>,
    voices: Vec<Voice>,
    trigger: TriggerState,
    transfer: Option<Transfer>,
    /// Interrupts raised by register writes, delivered on the next tick
    pending: Vec<Interrupt>,
    stats: SpuStats,
    log: VecDeque<TransferRecord>,
}

impl SpuCore {
    fn new(config: SpuConfig) -> Self {
        let mut ram = vec![0u8; SPU_RAM_SIZE as usize];
        let inert = ram_block(config.inert_block_addr) as usize;
        ram[inert..inert + BLOCK_SIZE as usize].copy_from_slice(&silent_block(BlockFlags::INERT));

        Self {
            config,
            ram,
            voices: vec![Voice::default(); VOICE_COUNT],
            trigger: TriggerState {
                enabled: false,
                addr: 0,
                latched: false,
            },
            transfer: None,
            pending: Vec::new(),
            stats: SpuStats::default(),
            log: VecDeque::with_capacity(TRANSFER_LOG_CAPACITY),
        }
    }

    fn voice_mut(&mut self, voice: usize) -> Option<&mut Voice> {
        let found = self.voices.get_mut(voice);
        if found.is_none() {
            warn!(voice, "Register write to nonexistent voice ignored");
        }
        found
    }

    fn tick(&mut self, events: &mut Vec<Interrupt>) {
        self.stats.ticks += 1;
        events.append(&mut self.pending);

        for voice in 0..self.voices.len() {
            if let Some(block) = self.voices[voice].tick(&self.ram) {
                self.on_fetch(voice, block, events);
            }
        }

        let done = match &mut self.transfer {
            Some(transfer) => {
                transfer.remaining_ticks = transfer.remaining_ticks.saturating_sub(1);
                transfer.remaining_ticks == 0
            }
            None => false,
        };
        if done {
            self.finish_transfer(events, true);
        }
    }

    fn on_fetch(&mut self, voice: usize, block: u32, events: &mut Vec<Interrupt>) {
        if self.transfer.as_ref().is_some_and(|t| t.covers(block)) {
            self.stats.torn_reads += 1;
            warn!(voice, addr = block, "Voice read a block while it was being written");
        }
        self.check_trigger(block, events);
    }

    /// Raise the position trigger if `block` holds the watch address
    fn check_trigger(&mut self, block: u32, events: &mut Vec<Interrupt>) {
        let trigger = &mut self.trigger;
        if trigger.enabled && !trigger.latched && ram_block(trigger.addr) == block {
            trigger.latched = true;
            self.stats.triggers_raised += 1;
            events.push(Interrupt::PositionTrigger);
        }
    }

    /// Write the in-flight transfer to RAM. `interrupt` is false when the
    /// transfer is cut short by an overrun.
    fn finish_transfer(&mut self, events: &mut Vec<Interrupt>, interrupt: bool) {
        let Some(transfer) = self.transfer.take() else {
            return;
        };

        for (offset, &byte) in transfer.data.iter().enumerate() {
            let addr = (transfer.addr as usize + offset) % self.ram.len();
            self.ram[addr] = byte;
        }
        self.stats.transfers_completed += 1;

        // Writes pass the watch address just like voice reads do.
        let watch = ram_block(self.trigger.addr);
        if transfer.covers(watch) {
            self.check_trigger(watch, events);
        }

        if !interrupt {
            return;
        }
        if self.config.drop_completions {
            self.stats.completions_dropped += 1;
            debug!(addr = transfer.addr, "Transfer completion dropped");
        } else {
            events.push(Interrupt::TransferComplete);
        }
    }

    fn begin_transfer(&mut self, addr: u32, data: &[u8]) {
        if self.transfer.is_some() {
            self.stats.transfer_overruns += 1;
            warn!(addr, "Transfer started while another was in flight");
            // The earlier transfer is flushed without its interrupt.
            self.finish_transfer(&mut Vec::new(), false);
        }
        if data.len() > self.ram.len() {
            warn!(len = data.len(), "Transfer larger than sample RAM wraps around");
        }

        let mut first_block = [0u8; BLOCK_SIZE as usize];
        let head = data.len().min(first_block.len());
        first_block[..head].copy_from_slice(&data[..head]);
        if self.log.len() == TRANSFER_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(TransferRecord {
            addr,
            len: data.len(),
            tick: self.stats.ticks,
            first_block,
        });
        self.stats.transfers_started += 1;

        self.transfer = Some(Transfer {
            addr: block_base(addr) & (SPU_RAM_SIZE - 1),
            data: data.to_vec(),
            remaining_ticks: self.config.transfer_latency_ticks.max(1),
        });
    }
}

struct Shared {
    config: SpuConfig,
    core: Mutex<SpuCore>,
    handler: Mutex<Option<Arc<dyn InterruptHandler>>>,
    /// Held while time advances so handler invocations never overlap
    dispatch: Mutex<()>,
}

/// Software SPU.
///
/// Cheap to clone; clones share the same device. Time only moves through
/// [`Spu::advance`], [`SoundDevice::wait_hint`] or an attached
/// [`crate::SpuClock`]. Handlers must not advance time themselves.
#[derive(Clone)]
pub struct Spu {
    shared: Arc<Shared>,
}

impl Spu {
    pub fn new(config: SpuConfig) -> Self {
        debug!(?config, "SPU model powered on");
        Self {
            shared: Arc::new(Shared {
                config,
                core: Mutex::new(SpuCore::new(config)),
                handler: Mutex::new(None),
                dispatch: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &SpuConfig {
        &self.shared.config
    }

    /// Run the device for `ticks` samples, dispatching interrupts as they occur
    pub fn advance(&self, ticks: u64) {
        let _dispatch = self
            .shared
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut events = Vec::new();
        for _ in 0..ticks {
            self.core().tick(&mut events);
            for irq in events.drain(..) {
                self.dispatch(irq);
            }
        }
    }

    pub fn stats(&self) -> SpuStats {
        self.core().stats
    }

    /// Most recent transfers, oldest first
    pub fn transfer_log(&self) -> Vec<TransferRecord> {
        self.core().log.iter().cloned().collect()
    }

    pub fn voice(&self, voice: usize) -> Option<VoiceSnapshot> {
        self.core().voices.get(voice).map(Voice::snapshot)
    }

    pub fn trigger(&self) -> TriggerState {
        self.core().trigger
    }

    pub fn transfer_in_flight(&self) -> bool {
        self.core().transfer.is_some()
    }

    /// Copy `len` bytes of sample RAM starting at `addr`, wrapping at the end
    pub fn read_ram(&self, addr: u32, len: usize) -> Vec<u8> {
        let core = self.core();
        (0..len)
            .map(|offset| core.ram[(addr as usize + offset) % core.ram.len()])
            .collect()
    }

    fn core(&self) -> MutexGuard<'_, SpuCore> {
        self.shared.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, irq: Interrupt) {
        let handler = self
            .shared
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => {
                trace!(?irq, "Dispatching interrupt");
                handler.service(irq);
            }
            None => trace!(?irq, "Interrupt with no handler registered"),
        }
    }
}

impl Default for Spu {
    fn default() -> Self {
        Self::new(SpuConfig::default())
    }
}

impl SoundDevice for Spu {
    fn set_trigger_enabled(&self, enabled: bool) {
        let mut core = self.core();
        core.trigger.enabled = enabled;
        if !enabled {
            core.trigger.latched = false;
        }
    }

    fn set_trigger_address(&self, addr: u32) {
        self.core().trigger.addr = addr;
    }

    fn set_voice_start_address(&self, voice: usize, addr: u32) {
        if let Some(v) = self.core().voice_mut(voice) {
            v.start_addr = addr;
        }
    }

    fn set_voice_loop_address(&self, voice: usize, addr: u32) {
        if let Some(v) = self.core().voice_mut(voice) {
            v.loop_addr = addr;
        }
    }

    fn set_voice_pitch(&self, voice: usize, pitch: u16) {
        if let Some(v) = self.core().voice_mut(voice) {
            v.pitch = pitch;
        }
    }

    fn set_voice_envelope(&self, voice: usize, envelope: Envelope) {
        if let Some(v) = self.core().voice_mut(voice) {
            v.envelope = envelope;
        }
    }

    fn set_voice_volume(&self, voice: usize, volume: Volume) {
        if let Some(v) = self.core().voice_mut(voice) {
            v.volume = volume;
        }
    }

    fn key_on(&self, voices: VoiceMask) {
        let mut core = self.core();
        let mut raised = Vec::new();
        for voice in voices.voices() {
            let block = {
                let SpuCore {
                    voices: slots, ram, ..
                } = &mut *core;
                slots[voice].key_on(ram)
            };
            core.on_fetch(voice, block, &mut raised);
        }
        if !raised.is_empty() {
            trace!("Key-on raised a position trigger");
            core.pending.append(&mut raised);
        }
    }

    fn key_off(&self, voices: VoiceMask) {
        let mut core = self.core();
        for voice in voices.voices() {
            core.voices[voice].key_off();
        }
    }

    fn begin_transfer(&self, addr: u32, data: &[u8]) {
        trace!(addr, len = data.len(), "Transfer started");
        self.core().begin_transfer(addr, data);
    }

    fn register_interrupts(&self, handler: Arc<dyn InterruptHandler>) {
        *self
            .shared
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
        debug!("Interrupt handler registered");
    }

    fn wait_hint(&self) {
        match self.shared.config.idle_ticks {
            0 => thread::yield_now(),
            ticks => self.advance(ticks),
        }
    }
}
