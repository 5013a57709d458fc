//! End-to-end streaming through the SPU model

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nether_spu::{Spu, SpuClock, SpuConfig, SynthParams, channel_marker, chunk_marker, synthesize};
use nether_stream::device::NATURAL_PITCH;
use nether_stream::{PrimingConfig, StreamConfig, StreamEngine, StreamError, reset_voices};

const TICKS_PER_BLOCK: u64 = 28;

fn stream_config() -> StreamConfig {
    StreamConfig {
        priming: PrimingConfig {
            max_spins: 100_000,
            timeout_ms: 0,
        },
        ..StreamConfig::default()
    }
}

fn fast_spu() -> SpuConfig {
    SpuConfig {
        transfer_latency_ticks: 16,
        idle_ticks: 4,
        ..SpuConfig::default()
    }
}

fn bring_up(spu_config: SpuConfig) -> (Spu, Arc<StreamEngine<Spu>>) {
    let spu = Spu::new(spu_config);
    let config = stream_config();
    reset_voices(&spu, &config.layout);
    let engine = Arc::new(StreamEngine::new(spu.clone(), config));
    (spu, engine)
}

fn params(interleave: u32, chunk_count: u32, channels: u16) -> SynthParams {
    SynthParams {
        interleave,
        chunk_count,
        channels,
        ..SynthParams::default()
    }
}

/// Chunk marker of the block `voice` is playing
fn playing_chunk(spu: &Spu, voice: usize) -> u32 {
    let addr = spu.voice(voice).unwrap().current_addr;
    chunk_marker(&spu.read_ram(addr, 16)).unwrap()
}

fn loaded_markers(spu: &Spu) -> Vec<u32> {
    spu.transfer_log()
        .iter()
        .map(|record| chunk_marker(&record.first_block).unwrap())
        .collect()
}

// ============================================================================
// Gapless playback
// ============================================================================

#[test]
fn test_stereo_playback_is_gapless_and_ordered() {
    let (spu, engine) = bring_up(fast_spu());
    let asset = synthesize(&params(64, 22, 2)).unwrap();
    engine.initialize(asset).unwrap();
    engine.start().unwrap();

    let chunk_ticks = 4 * TICKS_PER_BLOCK;
    let mut expected = 0;
    assert_eq!(playing_chunk(&spu, 0), expected);
    for _ in 0..60 {
        spu.advance(chunk_ticks);
        expected = (expected + 1) % 22;
        assert_eq!(playing_chunk(&spu, 0), expected);
        assert_eq!(playing_chunk(&spu, 1), expected);

        let right = spu.voice(1).unwrap().current_addr;
        assert_eq!(channel_marker(&spu.read_ram(right, 16)), Some(1));
    }

    let stats = spu.stats();
    assert_eq!(stats.torn_reads, 0);
    assert_eq!(stats.transfer_overruns, 0);

    let markers = loaded_markers(&spu);
    assert!(markers.len() > 60);
    for (i, marker) in markers.iter().enumerate() {
        assert_eq!(*marker, i as u32 % 22, "load {i}");
    }
}

#[test]
fn test_single_chunk_loops_through_both_sets() {
    let (spu, engine) = bring_up(SpuConfig {
        transfer_latency_ticks: 8,
        ..fast_spu()
    });
    engine.initialize(synthesize(&params(32, 1, 1)).unwrap()).unwrap();
    engine.start().unwrap();

    let chunk_ticks = 2 * TICKS_PER_BLOCK;
    let mut sets = Vec::new();
    for _ in 0..40 {
        spu.advance(chunk_ticks);
        assert_eq!(playing_chunk(&spu, 0), 0);
        let addr = spu.voice(0).unwrap().current_addr;
        sets.push((addr - 0x1010) / 32);
    }
    // Playback alternates between the two 32-byte buffer sets.
    for pair in sets.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
    assert_eq!(spu.stats().torn_reads, 0);
    assert!(loaded_markers(&spu).iter().all(|&m| m == 0));
}

#[test]
fn test_twenty_third_load_is_chunk_zero() {
    let (spu, engine) = bring_up(SpuConfig::default());
    let asset = synthesize(&SynthParams::default()).unwrap();
    let geometry = engine.initialize(asset).unwrap();
    assert_eq!(geometry.chunk_count, 22);
    engine.start().unwrap();

    let chunk_ticks = u64::from(geometry.chunk_buffer_size / 16) * TICKS_PER_BLOCK;
    while engine.status().chunks_loaded < 23 {
        spu.advance(chunk_ticks / 4);
    }

    let markers = loaded_markers(&spu);
    assert_eq!(markers[21], 21);
    assert_eq!(markers[22], 0);
    assert_eq!(spu.stats().torn_reads, 0);
}

// ============================================================================
// Control surface
// ============================================================================

#[test]
fn test_pause_and_resume() {
    let (spu, engine) = bring_up(fast_spu());
    engine.initialize(synthesize(&params(64, 22, 2)).unwrap()).unwrap();
    engine.start().unwrap();

    let chunk_ticks = 4 * TICKS_PER_BLOCK;
    spu.advance(chunk_ticks * 5);
    engine.stop().unwrap();

    let paused = engine.status();
    let started = spu.stats().transfers_started;
    spu.advance(chunk_ticks * 20);

    assert!(!paused.running);
    assert_eq!(spu.stats().transfers_started, started, "no loads while paused");
    for voice in 0..2 {
        let snapshot = spu.voice(voice).unwrap();
        assert_eq!(snapshot.current_addr, 0x1000);
        assert!(snapshot.keyed_on);
    }
    assert_eq!(engine.status().chunk_index, paused.chunk_index);

    engine.start().unwrap();
    let mut expected = paused.chunk_index as u32;
    assert_eq!(playing_chunk(&spu, 0), expected);
    for _ in 0..30 {
        spu.advance(chunk_ticks);
        expected = (expected + 1) % 22;
        assert_eq!(playing_chunk(&spu, 0), expected);
    }
    assert_eq!(spu.stats().torn_reads, 0);
}

#[test]
fn test_double_start_matches_single_start() {
    let run = |starts: usize| {
        let (spu, engine) = bring_up(fast_spu());
        engine.initialize(synthesize(&params(64, 5, 2)).unwrap()).unwrap();
        for _ in 0..starts {
            engine.start().unwrap();
        }
        spu.advance(4 * TICKS_PER_BLOCK * 12);
        (spu.transfer_log(), spu.stats(), engine.status())
    };
    assert_eq!(run(1), run(2));
}

#[test]
fn test_initialize_times_out_when_completions_are_lost() {
    let spu = Spu::new(SpuConfig {
        drop_completions: true,
        ..fast_spu()
    });
    let config = StreamConfig {
        priming: PrimingConfig {
            max_spins: 100,
            timeout_ms: 0,
        },
        ..StreamConfig::default()
    };
    reset_voices(&spu, &config.layout);
    let engine = Arc::new(StreamEngine::new(spu.clone(), config));

    let result = engine.initialize(synthesize(&params(64, 4, 1)).unwrap());
    assert!(matches!(
        result,
        Err(StreamError::InitializationTimeout { spins: 100, .. })
    ));
    assert!(engine.status().buffering);
    assert_eq!(spu.stats().completions_dropped, 1);
}

#[test]
fn test_reset_voices_parks_every_voice() {
    let spu = Spu::new(fast_spu());
    reset_voices(&spu, &StreamConfig::default().layout);
    spu.advance(TICKS_PER_BLOCK * 10);

    for voice in 0..nether_stream::VOICE_COUNT {
        let snapshot = spu.voice(voice).unwrap();
        assert!(snapshot.keyed_on);
        assert_eq!(snapshot.current_addr, 0x1000);
        assert_eq!(snapshot.pitch, NATURAL_PITCH);
    }
    assert_eq!(spu.stats().triggers_raised, 0);
}

// ============================================================================
// Real-time clock
// ============================================================================

#[test]
fn test_streaming_with_clock_thread() {
    let spu = Spu::new(SpuConfig {
        transfer_latency_ticks: 64,
        idle_ticks: 0,
        ..SpuConfig::default()
    });
    let config = StreamConfig {
        priming: PrimingConfig {
            max_spins: 0,
            timeout_ms: 5000,
        },
        ..StreamConfig::default()
    };
    reset_voices(&spu, &config.layout);
    let engine = Arc::new(StreamEngine::new(spu.clone(), config));
    let _clock = SpuClock::spawn(spu.clone(), Duration::from_millis(1), 10.0).unwrap();

    engine.initialize(synthesize(&params(256, 7, 2)).unwrap()).unwrap();
    engine.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.status().chunks_loaded < 30 {
        assert!(Instant::now() < deadline, "stream stalled: {}", engine.status());
        thread::sleep(Duration::from_millis(5));
    }
    engine.stop().unwrap();

    let markers = loaded_markers(&spu);
    for (i, marker) in markers.iter().enumerate() {
        assert_eq!(*marker, i as u32 % 7, "load {i}");
    }
    assert_eq!(spu.stats().torn_reads, 0);
}
