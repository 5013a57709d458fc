//! Sound device seam
//!
//! [`SoundDevice`] is the register-level interface the engine drives. Methods
//! take `&self` because they stand for memory-mapped register writes that may
//! be issued from interrupt context as well as from the control thread.

use std::sync::Arc;

/// Number of hardware voices
pub const VOICE_COUNT: usize = 24;

/// Sample RAM size in bytes
pub const SPU_RAM_SIZE: u32 = 512 * 1024;

/// Size of one ADPCM block in bytes
pub const BLOCK_SIZE: u32 = 16;

/// Samples decoded from one ADPCM block
pub const SAMPLES_PER_BLOCK: u32 = 28;

/// Rate at which the device consumes samples at pitch `0x1000`
pub const DEVICE_SAMPLE_RATE: u32 = 44_100;

/// Pitch that plays one sample per device tick
pub const NATURAL_PITCH: u16 = 0x1000;

/// Highest pitch register value
pub const MAX_PITCH: u16 = 0x3fff;

/// Full-scale voice volume
pub const FULL_VOLUME: i16 = 0x3fff;

/// Convert a sample rate in Hz to a pitch register value
pub fn pitch_for_rate(rate_hz: u32) -> u16 {
    let pitch = (u64::from(rate_hz) << 12) / u64::from(DEVICE_SAMPLE_RATE);
    pitch.min(u64::from(MAX_PITCH)) as u16
}

/// Set of voices addressed by a key-on/key-off command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VoiceMask(u32);

impl VoiceMask {
    /// Every hardware voice
    pub const ALL: Self = Self(0x00ff_ffff);

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Voices `0..count`
    pub fn first(count: usize) -> Self {
        if count == 0 {
            return Self::empty();
        }
        Self(Self::ALL.0 >> (VOICE_COUNT - count.min(VOICE_COUNT)))
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, voice: usize) -> bool {
        voice < VOICE_COUNT && self.0 & (1 << voice) != 0
    }

    /// Iterate over the voice indices in the mask
    pub fn voices(self) -> impl Iterator<Item = usize> {
        (0..VOICE_COUNT).filter(move |&voice| self.contains(voice))
    }
}

/// ADSR envelope register pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Envelope {
    pub adsr1: u16,
    pub adsr2: u16,
}

impl Envelope {
    /// Instant attack, full sustain, no release; the stream controls its own length
    pub const SUSTAIN: Self = Self {
        adsr1: 0x00ff,
        adsr2: 0x0000,
    };
}

/// Per-voice left/right volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Volume {
    pub left: i16,
    pub right: i16,
}

impl Volume {
    pub const LEFT: Self = Self {
        left: FULL_VOLUME,
        right: 0,
    };
    pub const RIGHT: Self = Self {
        left: 0,
        right: FULL_VOLUME,
    };
    pub const CENTER: Self = Self {
        left: FULL_VOLUME,
        right: FULL_VOLUME,
    };
}

/// Interrupt sources the engine handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// A voice read the block containing the watch address
    PositionTrigger,
    /// The transfer started by `begin_transfer` finished
    TransferComplete,
}

/// Receiver for device interrupts
///
/// The device must never call `service` while another `service` call is
/// still running.
pub trait InterruptHandler: Send + Sync {
    fn service(&self, irq: Interrupt);
}

/// Register-level access to the playback device
///
/// Addresses are byte addresses into sample RAM.
pub trait SoundDevice: Send + Sync {
    /// Enable or disable the position-trigger interrupt.
    ///
    /// Disabling also acknowledges a latched trigger.
    fn set_trigger_enabled(&self, enabled: bool);

    /// Watch address for the position trigger
    fn set_trigger_address(&self, addr: u32);

    /// Address a voice starts reading from on key-on
    fn set_voice_start_address(&self, voice: usize, addr: u32);

    /// Address a voice jumps to after a loop-end block
    fn set_voice_loop_address(&self, voice: usize, addr: u32);

    fn set_voice_pitch(&self, voice: usize, pitch: u16);

    fn set_voice_envelope(&self, voice: usize, envelope: Envelope);

    fn set_voice_volume(&self, voice: usize, volume: Volume);

    fn key_on(&self, voices: VoiceMask);

    fn key_off(&self, voices: VoiceMask);

    /// Start an asynchronous copy of `data` into sample RAM at `addr`.
    ///
    /// Completion is signalled with [`Interrupt::TransferComplete`].
    fn begin_transfer(&self, addr: u32, data: &[u8]);

    /// Route both interrupt sources to `handler`, replacing any previous one
    fn register_interrupts(&self, handler: Arc<dyn InterruptHandler>);

    /// Called on every iteration of a busy-wait
    fn wait_hint(&self) {
        std::hint::spin_loop();
    }
}

impl<D: SoundDevice + ?Sized> SoundDevice for Arc<D> {
    fn set_trigger_enabled(&self, enabled: bool) {
        (**self).set_trigger_enabled(enabled)
    }
    fn set_trigger_address(&self, addr: u32) {
        (**self).set_trigger_address(addr)
    }
    fn set_voice_start_address(&self, voice: usize, addr: u32) {
        (**self).set_voice_start_address(voice, addr)
    }
    fn set_voice_loop_address(&self, voice: usize, addr: u32) {
        (**self).set_voice_loop_address(voice, addr)
    }
    fn set_voice_pitch(&self, voice: usize, pitch: u16) {
        (**self).set_voice_pitch(voice, pitch)
    }
    fn set_voice_envelope(&self, voice: usize, envelope: Envelope) {
        (**self).set_voice_envelope(voice, envelope)
    }
    fn set_voice_volume(&self, voice: usize, volume: Volume) {
        (**self).set_voice_volume(voice, volume)
    }
    fn key_on(&self, voices: VoiceMask) {
        (**self).key_on(voices)
    }
    fn key_off(&self, voices: VoiceMask) {
        (**self).key_off(voices)
    }
    fn begin_transfer(&self, addr: u32, data: &[u8]) {
        (**self).begin_transfer(addr, data)
    }
    fn register_interrupts(&self, handler: Arc<dyn InterruptHandler>) {
        (**self).register_interrupts(handler)
    }
    fn wait_hint(&self) {
        (**self).wait_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_for_rate() {
        assert_eq!(pitch_for_rate(44_100), NATURAL_PITCH);
        assert_eq!(pitch_for_rate(22_050), 0x0800);
        assert_eq!(pitch_for_rate(0), 0);
        // 4x the device rate is clamped to the register maximum.
        assert_eq!(pitch_for_rate(176_400), MAX_PITCH);
    }

    #[test]
    fn test_voice_mask_first() {
        assert_eq!(VoiceMask::first(1).bits(), 0b1);
        assert_eq!(VoiceMask::first(2).bits(), 0b11);
        assert_eq!(VoiceMask::first(24), VoiceMask::ALL);
        assert_eq!(VoiceMask::first(0), VoiceMask::empty());
        assert_eq!(VoiceMask::first(30), VoiceMask::ALL);
    }

    #[test]
    fn test_voice_mask_voices() {
        let voices: Vec<usize> = VoiceMask::from_bits(0b1010).voices().collect();
        assert_eq!(voices, vec![1, 3]);
        assert!(!VoiceMask::ALL.contains(24));
    }
}
