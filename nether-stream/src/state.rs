//! Shared stream state
//!
//! One instance per engine. Writers are the two interrupt handlers and the
//! controller, always inside the engine's critical section. Fields are atomics
//! so [`StreamStatus`] snapshots can be taken without the lock; a snapshot is
//! not atomic as a whole and may mix values from before and after a handler.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::header::{HEADER_REGION_SIZE, StreamGeometry};

/// Acknowledge state of the position-trigger interrupt.
///
/// Disarmed on entry to the chunk loader, armed only when a transfer completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLatch {
    Armed,
    Disarmed,
}

/// Asset bytes and geometry, fixed once initialized
pub(crate) struct Stream {
    asset: Arc<[u8]>,
    pub geometry: StreamGeometry,
}

impl Stream {
    pub fn new(asset: Arc<[u8]>, geometry: StreamGeometry) -> Self {
        Self { asset, geometry }
    }

    /// Raw chunk data after the header region
    pub fn payload(&self) -> &[u8] {
        &self.asset[HEADER_REGION_SIZE..]
    }

    /// Bytes of `chunk`; the range was validated against the payload length
    pub fn chunk(&self, chunk: u32) -> &[u8] {
        &self.payload()[self.geometry.chunk_range(chunk)]
    }
}

pub(crate) struct StreamState {
    stream: OnceLock<Stream>,
    active_parity: AtomicU8,
    loading: AtomicBool,
    next_chunk_index: AtomicI32,
    current_load_address: AtomicU32,
    armed: AtomicBool,
    running: AtomicBool,
    chunks_loaded: AtomicU64,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            stream: OnceLock::new(),
            active_parity: AtomicU8::new(1),
            loading: AtomicBool::new(false),
            next_chunk_index: AtomicI32::new(-1),
            current_load_address: AtomicU32::new(0),
            armed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            chunks_loaded: AtomicU64::new(0),
        }
    }

    /// Install the stream; fails if one is already installed
    pub fn install(&self, stream: Stream) -> Result<(), Stream> {
        self.stream.set(stream)
    }

    pub fn stream(&self) -> Option<&Stream> {
        self.stream.get()
    }

    pub fn active_parity(&self) -> u8 {
        self.active_parity.load(Ordering::Relaxed)
    }

    pub fn set_active_parity(&self, parity: u8) {
        self.active_parity.store(parity & 1, Ordering::Relaxed);
    }

    /// Flip parity and return the new value
    pub fn flip_parity(&self) -> u8 {
        self.active_parity.fetch_xor(1, Ordering::Relaxed) ^ 1
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::Release);
    }

    pub fn next_chunk_index(&self) -> i32 {
        self.next_chunk_index.load(Ordering::Relaxed)
    }

    pub fn set_next_chunk_index(&self, index: i32) {
        self.next_chunk_index.store(index, Ordering::Relaxed);
    }

    pub fn current_load_address(&self) -> u32 {
        self.current_load_address.load(Ordering::Relaxed)
    }

    pub fn set_current_load_address(&self, addr: u32) {
        self.current_load_address.store(addr, Ordering::Relaxed);
    }

    pub fn latch(&self) -> IrqLatch {
        if self.armed.load(Ordering::Relaxed) {
            IrqLatch::Armed
        } else {
            IrqLatch::Disarmed
        }
    }

    pub fn set_latch(&self, latch: IrqLatch) {
        self.armed.store(latch == IrqLatch::Armed, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.chunks_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status(&self) -> StreamStatus {
        let geometry = self.stream().map(|stream| stream.geometry);
        StreamStatus {
            initialized: geometry.is_some(),
            active_parity: self.active_parity(),
            chunk_index: self.next_chunk_index(),
            chunk_count: geometry.map_or(0, |g| g.chunk_count),
            buffering: self.is_loading(),
            sample_rate: geometry.map_or(0, |g| g.sample_rate),
            channel_count: geometry.map_or(0, |g| g.channel_count),
            running: self.is_running(),
            latch: self.latch(),
            chunks_loaded: self.chunks_loaded.load(Ordering::Relaxed),
        }
    }
}

/// Diagnostic snapshot of the stream, for display only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub initialized: bool,
    /// Buffer set currently being filled (0 or 1)
    pub active_parity: u8,
    /// Chunk most recently loaded; -1 before the first load
    pub chunk_index: i32,
    pub chunk_count: u32,
    /// A chunk transfer is in flight
    pub buffering: bool,
    pub sample_rate: u32,
    pub channel_count: u8,
    pub running: bool,
    pub latch: IrqLatch,
    /// Chunk loads since initialization, priming included
    pub chunks_loaded: u64,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.initialized {
            return write!(f, "stream not initialized");
        }
        write!(
            f,
            "buffer {} | chunk {}/{} | {} Hz x{} | {}{}",
            self.active_parity,
            self.chunk_index,
            self.chunk_count,
            self.sample_rate,
            self.channel_count,
            if self.running { "playing" } else { "stopped" },
            if self.buffering { " | buffering" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> StreamGeometry {
        StreamGeometry {
            chunk_buffer_size: 16,
            chunk_count: 3,
            sample_rate: 22_050,
            channel_count: 2,
        }
    }

    fn asset() -> Arc<[u8]> {
        let mut bytes = vec![0u8; HEADER_REGION_SIZE];
        bytes.extend((0..3u8).flat_map(|chunk| [chunk; 32]));
        bytes.into()
    }

    #[test]
    fn test_initial_state() {
        let state = StreamState::new();
        assert!(state.stream().is_none());
        assert_eq!(state.active_parity(), 1);
        assert_eq!(state.next_chunk_index(), -1);
        assert!(!state.is_loading());
        assert_eq!(state.latch(), IrqLatch::Disarmed);
        assert!(!state.status().initialized);
    }

    #[test]
    fn test_flip_parity() {
        let state = StreamState::new();
        assert_eq!(state.flip_parity(), 0);
        assert_eq!(state.flip_parity(), 1);
        assert_eq!(state.active_parity(), 1);
    }

    #[test]
    fn test_install_once() {
        let state = StreamState::new();
        assert!(state.install(Stream::new(asset(), geometry())).is_ok());
        assert!(state.install(Stream::new(asset(), geometry())).is_err());
        assert_eq!(state.status().chunk_count, 3);
    }

    #[test]
    fn test_stream_chunk_slices() {
        let stream = Stream::new(asset(), geometry());
        assert_eq!(stream.payload().len(), 96);
        assert_eq!(stream.chunk(0), &[0u8; 32]);
        assert_eq!(stream.chunk(2), &[2u8; 32]);
    }

    #[test]
    fn test_status_display() {
        let state = StreamState::new();
        assert_eq!(state.status().to_string(), "stream not initialized");

        state.install(Stream::new(asset(), geometry())).ok();
        state.set_next_chunk_index(1);
        state.set_loading(true);
        assert_eq!(
            state.status().to_string(),
            "buffer 1 | chunk 1/3 | 22050 Hz x2 | stopped | buffering"
        );
    }
}
