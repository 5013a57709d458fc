//! Stream error types

use std::time::Duration;

/// Reasons an asset is rejected before any state is touched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAsset {
    /// Buffer is smaller than the header region
    #[error("asset is {len} bytes, need at least {needed}")]
    TooShort { len: usize, needed: usize },

    /// Magic is not `VAGi`
    #[error("bad magic {0:02x?} (expected \"VAGi\")")]
    BadMagic([u8; 4]),

    /// Interleave of zero makes the chunk count undefined
    #[error("chunk interleave is zero")]
    ZeroInterleave,

    /// Interleave is not a whole number of 16-byte ADPCM blocks
    #[error("chunk interleave {0} is not a multiple of 16")]
    MisalignedInterleave(u32),

    /// Header declares no payload
    #[error("stream has no chunks (size is zero)")]
    EmptyStream,

    /// More channels than SPU voices
    #[error("{0} channels exceeds the {max} available voices", max = crate::device::VOICE_COUNT)]
    TooManyChannels(u16),

    /// Two buffer sets do not fit in device memory
    #[error("two buffer sets of {chunk_size} bytes starting at {start:#x} exceed {ram_size:#x} bytes of sample RAM")]
    DoesNotFit {
        chunk_size: u64,
        start: u32,
        ram_size: u32,
    },

    /// Payload ends before the last chunk
    #[error("payload is {len} bytes, {chunk_count} chunks need {needed}")]
    TruncatedPayload {
        len: usize,
        chunk_count: u32,
        needed: u64,
    },
}

/// Errors returned by the playback controller
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// Asset failed validation
    #[error("invalid asset: {0}")]
    InvalidAsset(#[from] InvalidAsset),

    /// A transfer-complete interrupt never arrived within the priming bound,
    /// either while priming in `initialize` or while `start` queued a chunk
    #[error("chunk transfer did not complete after {spins} spins ({elapsed:?})")]
    InitializationTimeout { spins: u64, elapsed: Duration },

    /// `initialize` was already called on this engine
    #[error("stream is already initialized")]
    AlreadyInitialized,

    /// `start`/`stop` called before `initialize`
    #[error("stream is not initialized")]
    NotInitialized,
}
