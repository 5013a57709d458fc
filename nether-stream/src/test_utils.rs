//! Test utilities for engine tests
//!
//! Provides a recording [`SoundDevice`] and asset builders so handler and
//! controller tests can run without a device model.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use byteorder::{ByteOrder, LittleEndian};

use crate::config::{PrimingConfig, StreamConfig};
use crate::controller::StreamEngine;
use crate::device::{Envelope, Interrupt, InterruptHandler, SoundDevice, VoiceMask, Volume};
use crate::header::{AssetHeader, HEADER_REGION_SIZE};

/// One register write observed by [`RecordingDevice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    TriggerEnabled(bool),
    TriggerAddress(u32),
    StartAddress(usize, u32),
    LoopAddress(usize, u32),
    Pitch(usize, u16),
    Envelope(usize, Envelope),
    Volume(usize, Volume),
    KeyOn(VoiceMask),
    KeyOff(VoiceMask),
    /// `marker` is the chunk marker stamped by [`test_asset`]
    Transfer { addr: u32, len: usize, marker: u32 },
}

#[derive(Default)]
struct Recording {
    ops: Vec<DeviceOp>,
    transfers: Vec<(u32, usize)>,
    markers: Vec<u32>,
    in_flight: usize,
    max_in_flight: usize,
    wait_hints: u64,
}

/// Device that records every register write.
///
/// In the default mode a pending transfer completes on the next
/// [`SoundDevice::wait_hint`]. A [`RecordingDevice::manual`] device only
/// raises interrupts through [`RecordingDevice::fire`].
pub struct RecordingDevice {
    recording: Mutex<Recording>,
    handler: Mutex<Option<Arc<dyn InterruptHandler>>>,
    auto_complete: bool,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            recording: Mutex::new(Recording::default()),
            handler: Mutex::new(None),
            auto_complete: true,
        }
    }

    pub fn manual() -> Self {
        Self {
            auto_complete: false,
            ..Self::new()
        }
    }

    pub fn ops(&self) -> Vec<DeviceOp> {
        self.recording.lock().unwrap().ops.clone()
    }

    /// Forget recorded register writes; transfers and markers are kept
    pub fn clear_ops(&self) {
        self.recording.lock().unwrap().ops.clear();
    }

    /// `(addr, len)` of every transfer started so far
    pub fn transfers(&self) -> Vec<(u32, usize)> {
        self.recording.lock().unwrap().transfers.clone()
    }

    /// Chunk marker of every transfer started so far
    pub fn loaded_markers(&self) -> Vec<u32> {
        self.recording.lock().unwrap().markers.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.recording.lock().unwrap().max_in_flight
    }

    pub fn wait_hints(&self) -> u64 {
        self.recording.lock().unwrap().wait_hints
    }

    pub fn handler_registered(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    /// Raise an interrupt on the calling thread
    pub fn fire(&self, irq: Interrupt) {
        if irq == Interrupt::TransferComplete {
            let mut recording = self.recording.lock().unwrap();
            recording.in_flight = recording.in_flight.saturating_sub(1);
        }
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler.service(irq);
        }
    }

    /// Block until at least `count` transfers have been started
    pub fn wait_for_transfers(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.transfers().len() < count {
            assert!(Instant::now() < deadline, "timed out waiting for transfers");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn record(&self, op: DeviceOp) {
        self.recording.lock().unwrap().ops.push(op);
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundDevice for RecordingDevice {
    fn set_trigger_enabled(&self, enabled: bool) {
        self.record(DeviceOp::TriggerEnabled(enabled));
    }

    fn set_trigger_address(&self, addr: u32) {
        self.record(DeviceOp::TriggerAddress(addr));
    }

    fn set_voice_start_address(&self, voice: usize, addr: u32) {
        self.record(DeviceOp::StartAddress(voice, addr));
    }

    fn set_voice_loop_address(&self, voice: usize, addr: u32) {
        self.record(DeviceOp::LoopAddress(voice, addr));
    }

    fn set_voice_pitch(&self, voice: usize, pitch: u16) {
        self.record(DeviceOp::Pitch(voice, pitch));
    }

    fn set_voice_envelope(&self, voice: usize, envelope: Envelope) {
        self.record(DeviceOp::Envelope(voice, envelope));
    }

    fn set_voice_volume(&self, voice: usize, volume: Volume) {
        self.record(DeviceOp::Volume(voice, volume));
    }

    fn key_on(&self, voices: VoiceMask) {
        self.record(DeviceOp::KeyOn(voices));
    }

    fn key_off(&self, voices: VoiceMask) {
        self.record(DeviceOp::KeyOff(voices));
    }

    fn begin_transfer(&self, addr: u32, data: &[u8]) {
        let marker = chunk_marker(data);
        let mut recording = self.recording.lock().unwrap();
        recording.ops.push(DeviceOp::Transfer {
            addr,
            len: data.len(),
            marker,
        });
        recording.transfers.push((addr, data.len()));
        recording.markers.push(marker);
        recording.in_flight += 1;
        recording.max_in_flight = recording.max_in_flight.max(recording.in_flight);
    }

    fn register_interrupts(&self, handler: Arc<dyn InterruptHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn wait_hint(&self) {
        let complete = {
            let mut recording = self.recording.lock().unwrap();
            recording.wait_hints += 1;
            if self.auto_complete && recording.in_flight > 0 {
                recording.in_flight -= 1;
                true
            } else {
                false
            }
        };
        if complete {
            let handler = self.handler.lock().unwrap().clone();
            if let Some(handler) = handler {
                handler.service(Interrupt::TransferComplete);
            }
        } else {
            thread::yield_now();
        }
    }
}

fn chunk_marker(data: &[u8]) -> u32 {
    if data.len() < 6 {
        return 0;
    }
    LittleEndian::read_u32(&data[2..6])
}

/// Build a 44.1 kHz asset whose blocks carry their chunk index as a marker.
///
/// An `interleave` of zero yields a header-only asset.
pub fn test_asset(interleave: u32, total_size: u32, channels: u16) -> Vec<u8> {
    let header = AssetHeader::new(interleave, total_size, 44_100, channels).with_name("test");
    let mut asset = vec![0u8; HEADER_REGION_SIZE];
    asset[..AssetHeader::SIZE].copy_from_slice(&header.to_bytes());
    if interleave == 0 {
        return asset;
    }

    let chunk_count = total_size.div_ceil(interleave);
    let chunk_size = interleave as usize * usize::from(channels.max(1));
    for chunk in 0..chunk_count {
        let mut data = vec![0u8; chunk_size];
        for block in data.chunks_mut(16).filter(|block| block.len() >= 6) {
            LittleEndian::write_u32(&mut block[2..6], chunk);
        }
        asset.extend_from_slice(&data);
    }
    asset
}

/// Engine over `device` with a generous priming bound
pub fn test_engine(device: &Arc<RecordingDevice>) -> Arc<StreamEngine<Arc<RecordingDevice>>> {
    let config = StreamConfig {
        priming: PrimingConfig {
            max_spins: 0,
            timeout_ms: 10_000,
        },
        ..StreamConfig::default()
    };
    Arc::new(StreamEngine::new(Arc::clone(device), config))
}
