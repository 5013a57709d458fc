//! Play command - stream an asset through the SPU model in real time

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Args;
use nether_spu::{Spu, SpuClock, SpuConfig};
use nether_stream::{StreamEngine, reset_voices};
use tracing::{info, warn};

use crate::config::PlayerConfig;

/// Arguments for the play command
#[derive(Args)]
pub struct PlayArgs {
    /// Asset file
    pub input: PathBuf,

    /// Wall-clock seconds to play for
    #[arg(long, default_value_t = 5.0)]
    pub seconds: f64,

    /// Pause after this many seconds
    #[arg(long)]
    pub pause_at: Option<f64>,

    /// Length of the pause in seconds
    #[arg(long, default_value_t = 1.0)]
    pub pause_for: f64,

    /// Override clock.speed from the config
    #[arg(long)]
    pub speed: Option<f64>,
}

#[derive(Clone, Copy)]
enum Pause {
    Pending(Duration),
    Paused(Instant),
    Done,
}

/// Execute the play command
pub fn execute(args: PlayArgs, config: &PlayerConfig) -> Result<()> {
    let run_for = seconds(args.seconds, "--seconds")?;
    let speed = args.speed.unwrap_or(config.clock.speed);
    let mut pause = match args.pause_at {
        Some(at) => Pause::Pending(seconds(at, "--pause-at")?),
        None => Pause::Done,
    };
    let pause_for = seconds(args.pause_for, "--pause-for")?;

    let asset: Arc<[u8]> = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?
        .into();

    // The clock thread drives time, so priming waits only yield.
    let spu = Spu::new(SpuConfig {
        idle_ticks: 0,
        ..config.spu
    });
    reset_voices(&spu, &config.stream.layout);
    let engine = Arc::new(StreamEngine::new(spu.clone(), config.stream.clone()));
    let clock = SpuClock::spawn(
        spu.clone(),
        Duration::from_millis(config.clock.quantum_ms),
        speed,
    )
    .context("Failed to start the SPU clock")?;

    let geometry = engine
        .initialize(asset)
        .with_context(|| format!("Failed to initialize {}", args.input.display()))?;
    println!(
        "Streaming {}: {} chunks x {} bytes, {} Hz x{}",
        args.input.display(),
        geometry.chunk_count,
        geometry.chunk_size(),
        geometry.sample_rate,
        geometry.channel_count
    );

    engine.start()?;
    let interval = Duration::from_millis(config.display.status_interval_ms);
    let started = Instant::now();
    while started.elapsed() < run_for {
        thread::sleep(interval);
        println!("{}", engine.status());

        match pause {
            Pause::Pending(at) if started.elapsed() >= at => {
                engine.stop()?;
                info!("Paused");
                pause = Pause::Paused(Instant::now());
            }
            Pause::Paused(since) if since.elapsed() >= pause_for => {
                engine.start()?;
                info!("Resumed");
                pause = Pause::Done;
            }
            _ => {}
        }
        if !clock.is_alive() {
            bail!("SPU clock thread exited");
        }
    }
    engine.stop()?;
    drop(clock);

    let stats = spu.stats();
    let status = engine.status();
    println!(
        "Done: {} chunks loaded, {} triggers, {} transfers, {} torn reads, {} overruns",
        status.chunks_loaded,
        stats.triggers_raised,
        stats.transfers_completed,
        stats.torn_reads,
        stats.transfer_overruns
    );
    if stats.torn_reads > 0 {
        warn!(
            torn_reads = stats.torn_reads,
            "Transfers did not keep up with playback; raise the interleave or lower the latency"
        );
    }
    Ok(())
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{flag} must be a non-negative number of seconds"))
}
