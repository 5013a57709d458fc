use tracing::debug;

use crate::config::LayoutConfig;
use crate::device::{NATURAL_PITCH, SoundDevice, VOICE_COUNT, VoiceMask};

/// Park every voice on the inert block.
///
/// Keys all voices off, points them at the silent looping block at the
/// natural pitch, then keys them back on so they idle there. Run once at
/// bring-up before initializing a stream.
pub fn reset_voices<D: SoundDevice + ?Sized>(device: &D, layout: &LayoutConfig) {
    device.key_off(VoiceMask::ALL);
    for voice in 0..VOICE_COUNT {
        device.set_voice_start_address(voice, layout.dummy_block_addr);
        device.set_voice_pitch(voice, NATURAL_PITCH);
    }
    device.key_on(VoiceMask::ALL);
    debug!(addr = layout.dummy_block_addr, "Voices parked on inert block");
}
