//! Info command - show an asset's header and chunk geometry

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nether_stream::{AssetHeader, HEADER_REGION_SIZE, pitch_for_rate};

use crate::config::PlayerConfig;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Asset file
    pub input: PathBuf,
}

/// Execute the info command
pub fn execute(args: InfoArgs, config: &PlayerConfig) -> Result<()> {
    let asset = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let header = AssetHeader::parse(&asset)
        .with_context(|| format!("{} is not a VAGi stream", args.input.display()))?;

    println!("File:        {}", args.input.display());
    println!("Name:        {}", header.name());
    println!("Version:     {:#x}", header.version);
    println!("Interleave:  {} bytes", header.chunk_interleave);
    println!("Total size:  {} bytes", header.total_size);
    println!(
        "Rate:        {} Hz (pitch {:#06x})",
        header.sample_rate,
        pitch_for_rate(header.sample_rate)
    );
    println!("Channels:    {}", header.channel_count);

    let geometry = header.geometry().context("Unplayable chunk geometry")?;
    let payload_len = asset.len().saturating_sub(HEADER_REGION_SIZE);
    println!("Chunks:      {}", geometry.chunk_count);
    println!("Chunk size:  {} bytes", geometry.chunk_size());
    println!("Payload:     {payload_len} bytes");

    match geometry.check_fits(&config.stream.layout, payload_len) {
        Ok(()) => println!("Status:      playable"),
        Err(e) => println!("Status:      not playable: {e}"),
    }
    Ok(())
}
