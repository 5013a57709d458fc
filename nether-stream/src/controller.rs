//! Playback controller: the control surface of the stream

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::device::{
    Envelope, Interrupt, InterruptHandler, SoundDevice, VoiceMask, Volume, pitch_for_rate,
};
use crate::error::StreamError;
use crate::header::{StreamGeometry, split_asset};
use crate::state::{IrqLatch, Stream, StreamState, StreamStatus};

/// Streaming engine for one asset.
///
/// Owns the stream state. The two interrupt handlers and the methods here
/// are its only mutators; every mutation runs inside the engine's critical
/// section.
pub struct StreamEngine<D: SoundDevice> {
    pub(crate) device: D,
    pub(crate) config: StreamConfig,
    pub(crate) state: StreamState,
    critical: Mutex<()>,
}

/// Forwards device interrupts without keeping the engine alive
struct HandlerLink<D: SoundDevice>(Weak<StreamEngine<D>>);

impl<D: SoundDevice + 'static> InterruptHandler for HandlerLink<D> {
    fn service(&self, irq: Interrupt) {
        if let Some(engine) = self.0.upgrade() {
            engine.service(irq);
        }
    }
}

impl<D: SoundDevice + 'static> StreamEngine<D> {
    pub fn new(device: D, config: StreamConfig) -> Self {
        Self {
            device,
            config,
            state: StreamState::new(),
            critical: Mutex::new(()),
        }
    }

    /// Diagnostic snapshot; values may be stale by the time they are read
    pub fn status(&self) -> StreamStatus {
        self.state.status()
    }

    /// Validate `asset`, hook up the interrupt handlers and prime the first chunk.
    ///
    /// `asset` is the whole file: the 2048-byte header region followed by the
    /// chunk payload. Returns once chunk 0 is resident in device memory.
    ///
    /// # Errors
    ///
    /// - [`StreamError::InvalidAsset`] if the header or payload is unusable
    /// - [`StreamError::AlreadyInitialized`] on a second call
    /// - [`StreamError::InitializationTimeout`] if the priming transfer never completes
    pub fn initialize(
        self: &Arc<Self>,
        asset: impl Into<Arc<[u8]>>,
    ) -> Result<StreamGeometry, StreamError> {
        if self.state.stream().is_some() {
            return Err(StreamError::AlreadyInitialized);
        }
        let asset = asset.into();
        let (header, geometry) = split_asset(&asset, &self.config.layout)?;

        {
            let _critical = self.critical_section();
            self.state
                .install(Stream::new(asset, geometry))
                .map_err(|_| StreamError::AlreadyInitialized)?;
            // Parity 1 and index -1 make the priming load fill set 0 with chunk 0.
            self.state.set_active_parity(1);
            self.state.set_next_chunk_index(-1);

            let link: Arc<dyn InterruptHandler> = Arc::new(HandlerLink(Arc::downgrade(self)));
            self.device.register_interrupts(link);
        }

        info!(
            name = %header.name(),
            chunks = geometry.chunk_count,
            chunk_size = geometry.chunk_size(),
            sample_rate = geometry.sample_rate,
            channels = geometry.channel_count,
            "Stream initialized"
        );

        self.load_next_chunk();
        self.wait_for_transfer()?;
        Ok(geometry)
    }

    /// Key on the stream voices and queue the following chunk.
    ///
    /// Does nothing if the stream is already playing. After [`Self::stop`],
    /// playback resumes from the most recently loaded chunk.
    ///
    /// # Errors
    ///
    /// - [`StreamError::NotInitialized`] before [`Self::initialize`]
    /// - [`StreamError::InitializationTimeout`] if a chunk transfer never completes
    pub fn start(&self) -> Result<(), StreamError> {
        let geometry = self.geometry()?;
        if self.state.is_running() {
            debug!("Stream already playing");
            return Ok(());
        }

        // Never start a second copy while one is in flight.
        self.wait_for_transfer()?;

        {
            let _critical = self.critical_section();
            if self.state.is_running() {
                debug!("Stream already playing");
                return Ok(());
            }
            // The loader is run by hand below, so keep the trigger quiet
            // while the voices are reprogrammed.
            self.device.set_trigger_enabled(false);
            self.state.set_latch(IrqLatch::Disarmed);

            let base = self.state.current_load_address();
            let pitch = pitch_for_rate(geometry.sample_rate);
            for voice in 0..geometry.channel_count as usize {
                self.device.set_voice_start_address(
                    voice,
                    base + geometry.chunk_buffer_size * voice as u32,
                );
                self.device.set_voice_pitch(voice, pitch);
                self.device.set_voice_envelope(voice, Envelope::SUSTAIN);
                self.device
                    .set_voice_volume(voice, voice_routing(voice, geometry.channel_count));
            }

            self.device
                .key_on(VoiceMask::first(geometry.channel_count as usize));
            self.state.set_running(true);
        }

        info!(chunk = self.state.next_chunk_index(), "Stream started");

        // Timing quirk: loading the next chunk right after key-on avoids a
        // race with the first automatic trigger.
        self.load_next_chunk();
        self.wait_for_transfer()
    }

    /// Key off the stream voices and park them on the inert block.
    ///
    /// The chunk cursor and parity are left alone so [`Self::start`] resumes.
    pub fn stop(&self) -> Result<(), StreamError> {
        let geometry = self.geometry()?;
        let _critical = self.critical_section();
        if !self.state.is_running() {
            debug!("Stream already stopped");
            return Ok(());
        }

        let voices = VoiceMask::first(geometry.channel_count as usize);
        self.device.key_off(voices);
        for voice in voices.voices() {
            self.device
                .set_voice_start_address(voice, self.config.layout.dummy_block_addr);
        }
        // The start address only takes effect on key-on.
        self.device.key_on(voices);
        self.state.set_running(false);

        info!(chunk = self.state.next_chunk_index(), "Stream stopped");
        Ok(())
    }
}

impl<D: SoundDevice> StreamEngine<D> {
    pub(crate) fn critical_section(&self) -> MutexGuard<'_, ()> {
        self.critical.lock().unwrap_or_else(|e| {
            warn!("Stream critical section poisoned; continuing");
            e.into_inner()
        })
    }

    fn geometry(&self) -> Result<StreamGeometry, StreamError> {
        self.state
            .stream()
            .map(|stream| stream.geometry)
            .ok_or(StreamError::NotInitialized)
    }

    /// Busy-wait until the in-flight transfer completes, bounded by the priming config
    fn wait_for_transfer(&self) -> Result<(), StreamError> {
        let priming = self.config.priming;
        let deadline = priming.timeout();
        let started = Instant::now();
        let mut spins: u64 = 0;

        while self.state.is_loading() {
            let elapsed = started.elapsed();
            let out_of_spins = priming.spin_limit().is_some_and(|max| spins >= max);
            let out_of_time = deadline.is_some_and(|limit| elapsed >= limit);
            if out_of_spins || out_of_time {
                warn!(spins, ?elapsed, "Chunk transfer never completed");
                return Err(StreamError::InitializationTimeout { spins, elapsed });
            }
            self.device.wait_hint();
            spins += 1;
        }
        Ok(())
    }
}

/// Output routing: mono is centered, otherwise even voices go left and odd right
fn voice_routing(voice: usize, channel_count: u8) -> Volume {
    if channel_count == 1 {
        Volume::CENTER
    } else if voice % 2 == 0 {
        Volume::LEFT
    } else {
        Volume::RIGHT
    }
}
