//! Interrupt handlers: chunk loader and transfer completion

use tracing::{debug, trace, warn};

use crate::controller::StreamEngine;
use crate::device::{Interrupt, InterruptHandler, SoundDevice};
use crate::state::IrqLatch;

impl<D: SoundDevice> StreamEngine<D> {
    /// Position-trigger handler.
    ///
    /// Swaps buffer sets and starts copying the next chunk into the one that
    /// just stopped playing. Also called directly to prime the pipeline; it
    /// must finish before it is entered again.
    pub(crate) fn load_next_chunk(&self) {
        let Some(stream) = self.state.stream() else {
            warn!("Position trigger before stream initialization");
            return;
        };
        let _critical = self.critical_section();

        // The only way to acknowledge the trigger is to disable it; the
        // completion handler enables it again once the chunk is resident.
        self.device.set_trigger_enabled(false);
        self.state.set_latch(IrqLatch::Disarmed);

        let geometry = stream.geometry;
        let chunk_size = geometry.chunk_size();
        let chunk = (i64::from(self.state.next_chunk_index()) + 1)
            .rem_euclid(i64::from(geometry.chunk_count)) as u32;

        let parity = self.state.flip_parity();
        self.state.set_loading(true);
        self.state.set_next_chunk_index(chunk as i32);

        let addr = self.config.layout.buffer_start_addr + if parity == 1 { chunk_size } else { 0 };
        self.state.set_current_load_address(addr);

        // Fire again when playback reaches the set being filled, and make
        // every voice jump there instead of looping the current chunk.
        self.device.set_trigger_address(addr);
        for voice in 0..geometry.channel_count as usize {
            self.device
                .set_voice_loop_address(voice, addr + geometry.chunk_buffer_size * voice as u32);
        }

        self.device.begin_transfer(addr, stream.chunk(chunk));
        self.state.record_load();

        trace!(chunk, parity, addr, "Loading chunk");
    }

    /// Transfer-complete handler: re-arm the position trigger.
    pub(crate) fn complete_transfer(&self) {
        let _critical = self.critical_section();
        if !self.state.is_loading() {
            debug!("Transfer completion with no chunk in flight, ignoring");
            return;
        }

        self.device.set_trigger_enabled(true);
        self.state.set_latch(IrqLatch::Armed);
        self.state.set_loading(false);

        trace!(chunk = self.state.next_chunk_index(), "Chunk resident");
    }
}

impl<D: SoundDevice> InterruptHandler for StreamEngine<D> {
    fn service(&self, irq: Interrupt) {
        match irq {
            Interrupt::PositionTrigger => self.load_next_chunk(),
            Interrupt::TransferComplete => self.complete_transfer(),
        }
    }
}
