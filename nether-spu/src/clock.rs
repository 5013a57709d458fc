//! Real-time clock thread for the SPU model
//!
//! Advances an [`Spu`] at the device rate (optionally scaled) so interrupts
//! arrive asynchronously with respect to the control thread, as they do on
//! hardware.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nether_stream::device::DEVICE_SAMPLE_RATE;
use tracing::debug;

use crate::spu::Spu;

/// Handle to a running clock thread
///
/// Dropping the handle stops the thread and joins it.
pub struct SpuClock {
    /// Dropped to signal the thread to exit
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SpuClock {
    /// Spawn a thread that advances `spu` every `quantum`.
    ///
    /// `speed` scales device time against wall time; 2.0 plays twice as fast.
    pub fn spawn(spu: Spu, quantum: Duration, speed: f64) -> io::Result<Self> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("clock speed must be positive, got {speed}"),
            ));
        }
        let rate = f64::from(DEVICE_SAMPLE_RATE) * speed;
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("spu-clock".into())
            .spawn(move || {
                debug!(rate, ?quantum, "SPU clock started");
                let started = Instant::now();
                let mut ticks_done: u64 = 0;
                loop {
                    match stop_rx.recv_timeout(quantum) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    // Catch up to wall time so sleep jitter does not drift.
                    let due = (started.elapsed().as_secs_f64() * rate) as u64;
                    if due > ticks_done {
                        spu.advance(due - ticks_done);
                        ticks_done = due;
                    }
                }
                debug!(ticks = ticks_done, "SPU clock stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SpuClock {
    fn drop(&mut self) {
        // Disconnect first, or the join below never returns.
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
