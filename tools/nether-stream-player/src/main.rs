//! Nether Stream - play VAGi streams on the software SPU
//!
//! # Commands
//!
//! - `nether-stream synth` - Write a synthetic stream with chunk markers
//! - `nether-stream info` - Show an asset's header and chunk geometry
//! - `nether-stream play` - Stream an asset through the SPU model in real time
//!
//! # Usage
//!
//! ```bash
//! nether-stream synth demo.vagi --chunks 22 --channels 2
//! nether-stream info demo.vagi
//! nether-stream play demo.vagi --seconds 10 --pause-at 3
//! ```
//!
//! # Config (player.toml)
//!
//! Read from `--config` or the platform config directory. Every key is optional.
//!
//! ```toml
//! [stream.layout]
//! buffer_start_addr = 0x1010
//!
//! [stream.priming]
//! timeout_ms = 1000
//!
//! [spu]
//! transfer_latency_ticks = 512
//!
//! [display]
//! status_interval_ms = 250
//!
//! [clock]
//! speed = 1.0
//! ```

mod config;
mod info;
mod play;
mod synth;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Nether Stream - play VAGi streams on the software SPU
#[derive(Parser)]
#[command(name = "nether-stream")]
#[command(about = "Double-buffered VAGi streaming on the software SPU")]
#[command(version)]
struct Cli {
    /// Config file (defaults to player.toml in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic stream whose blocks carry chunk markers
    Synth(synth::SynthArgs),

    /// Show an asset's header and chunk geometry
    Info(info::InfoArgs),

    /// Stream an asset through the SPU model
    Play(play::PlayArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::PlayerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Synth(args) => synth::execute(args),
        Commands::Info(args) => info::execute(args, &config),
        Commands::Play(args) => play::execute(args, &config),
    }
}
