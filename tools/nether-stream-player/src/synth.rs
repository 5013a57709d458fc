//! Synth command - write a synthetic VAGi stream

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nether_spu::{SynthParams, synthesize};

/// Arguments for the synth command
#[derive(Args)]
pub struct SynthArgs {
    /// Output file
    pub output: PathBuf,

    /// Bytes per channel per chunk (multiple of 16)
    #[arg(long, default_value_t = 4096)]
    pub interleave: u32,

    /// Number of chunks
    #[arg(long, default_value_t = 22)]
    pub chunks: u32,

    /// Nominal sample rate in Hz
    #[arg(long, default_value_t = 44_100)]
    pub rate: u32,

    /// Channel count (0 is mono)
    #[arg(long, default_value_t = 2)]
    pub channels: u16,

    /// Label stored in the header (16 bytes max)
    #[arg(long, default_value = "synth")]
    pub name: String,
}

/// Execute the synth command
pub fn execute(args: SynthArgs) -> Result<()> {
    let params = SynthParams {
        interleave: args.interleave,
        chunk_count: args.chunks,
        sample_rate: args.rate,
        channels: args.channels,
        name: args.name,
    };
    let asset = synthesize(&params).context("Invalid stream parameters")?;
    std::fs::write(&args.output, &asset)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Wrote {} ({} bytes): {} chunks x {} bytes x {} channel(s) @ {} Hz",
        args.output.display(),
        asset.len(),
        params.chunk_count,
        params.interleave,
        params.channels.max(1),
        params.sample_rate
    );
    Ok(())
}
