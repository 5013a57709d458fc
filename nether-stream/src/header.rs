//! Interleaved VAG (`VAGi`) asset header
//!
//! The header occupies a fixed 2048-byte region; the chunk payload starts
//! right after it.
//!
//! # Layout
//! ```text
//! 0x00: magic        [u8; 4]  "VAGi"
//! 0x04: version      u32 LE
//! 0x08: interleave   u32 LE   per-channel chunk buffer size
//! 0x0c: size         u32 BE   stream size per channel
//! 0x10: sample_rate  u32 BE   Hz
//! 0x14: reserved     [u8; 10]
//! 0x1e: channels     u16 LE   0 = mono
//! 0x20: name         [u8; 16]
//! ```
//!
//! The mixed byte order is part of the format (the authoring tool writes
//! `size` and `sample_rate` big-endian) and is kept bit-exact.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::config::LayoutConfig;
use crate::device::{BLOCK_SIZE, VOICE_COUNT};
use crate::error::InvalidAsset;

/// Magic for interleaved streams
pub const VAGI_MAGIC: [u8; 4] = *b"VAGi";

/// Bytes reserved for the header before the payload
pub const HEADER_REGION_SIZE: usize = 2048;

/// Parsed asset header, values already converted to host order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// Size of one channel's buffer within a chunk
    pub chunk_interleave: u32,
    /// Stream size per channel; chunk count is this over the interleave
    pub total_size: u32,
    pub sample_rate: u32,
    /// 0 means mono
    pub channel_count: u16,
    pub name: [u8; 16],
}

impl AssetHeader {
    /// Size of the meaningful part of the header record
    pub const SIZE: usize = 48;

    pub fn new(chunk_interleave: u32, total_size: u32, sample_rate: u32, channel_count: u16) -> Self {
        Self {
            magic: VAGI_MAGIC,
            version: 0x20,
            chunk_interleave,
            total_size,
            sample_rate,
            channel_count,
            name: [0; 16],
        }
    }

    /// Set the label, truncated to 16 bytes
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = [0; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(self.name.len());
        self.name[..len].copy_from_slice(&bytes[..len]);
        self
    }

    /// Label up to the first NUL
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Read and check the header record
    ///
    /// Only the record itself is checked here; see [`AssetHeader::geometry`]
    /// for the chunk geometry.
    pub fn parse(bytes: &[u8]) -> Result<Self, InvalidAsset> {
        if bytes.len() < Self::SIZE {
            return Err(InvalidAsset::TooShort {
                len: bytes.len(),
                needed: Self::SIZE,
            });
        }

        let header = Self::read_record(&mut Cursor::new(bytes)).map_err(|_| {
            InvalidAsset::TooShort {
                len: bytes.len(),
                needed: Self::SIZE,
            }
        })?;

        if header.magic != VAGI_MAGIC {
            return Err(InvalidAsset::BadMagic(header.magic));
        }
        Ok(header)
    }

    fn read_record(reader: &mut impl Read) -> std::io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        let version = reader.read_u32::<LittleEndian>()?;
        let chunk_interleave = reader.read_u32::<LittleEndian>()?;
        let total_size = reader.read_u32::<BigEndian>()?;
        let sample_rate = reader.read_u32::<BigEndian>()?;
        let mut reserved = [0u8; 10];
        reader.read_exact(&mut reserved)?;
        let channel_count = reader.read_u16::<LittleEndian>()?;
        let mut name = [0u8; 16];
        reader.read_exact(&mut name)?;

        Ok(Self {
            magic,
            version,
            chunk_interleave,
            total_size,
            sample_rate,
            channel_count,
            name,
        })
    }

    /// Write the header record in file byte order
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0x00..0x04].copy_from_slice(&self.magic);
        bytes[0x04..0x08].copy_from_slice(&self.version.to_le_bytes());
        bytes[0x08..0x0c].copy_from_slice(&self.chunk_interleave.to_le_bytes());
        bytes[0x0c..0x10].copy_from_slice(&self.total_size.to_be_bytes());
        bytes[0x10..0x14].copy_from_slice(&self.sample_rate.to_be_bytes());
        // 0x14..0x1e reserved
        bytes[0x1e..0x20].copy_from_slice(&self.channel_count.to_le_bytes());
        bytes[0x20..0x30].copy_from_slice(&self.name);
        bytes
    }

    /// Derive the chunk geometry
    pub fn geometry(&self) -> Result<StreamGeometry, InvalidAsset> {
        let interleave = self.chunk_interleave;
        if interleave == 0 {
            return Err(InvalidAsset::ZeroInterleave);
        }
        if interleave % BLOCK_SIZE != 0 {
            return Err(InvalidAsset::MisalignedInterleave(interleave));
        }
        if self.channel_count as usize > VOICE_COUNT {
            return Err(InvalidAsset::TooManyChannels(self.channel_count));
        }

        let chunk_count = self.total_size.div_ceil(interleave);
        if chunk_count == 0 {
            return Err(InvalidAsset::EmptyStream);
        }

        Ok(StreamGeometry {
            chunk_buffer_size: interleave,
            chunk_count,
            sample_rate: self.sample_rate,
            channel_count: self.channel_count.max(1) as u8,
        })
    }
}

/// Chunk geometry derived from the header, immutable after initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGeometry {
    /// Bytes per channel per chunk
    pub chunk_buffer_size: u32,
    pub chunk_count: u32,
    pub sample_rate: u32,
    pub channel_count: u8,
}

impl StreamGeometry {
    /// Bytes per chunk across all channels (one buffer set)
    pub fn chunk_size(&self) -> u32 {
        self.chunk_buffer_size.saturating_mul(self.channel_count as u32)
    }

    /// Payload byte range of `chunk`
    pub fn chunk_range(&self, chunk: u32) -> std::ops::Range<usize> {
        let size = self.chunk_size() as usize;
        let start = chunk as usize * size;
        start..start + size
    }

    /// Check that both buffer sets fit in sample RAM and the payload holds every chunk
    pub fn check_fits(&self, layout: &LayoutConfig, payload_len: usize) -> Result<(), InvalidAsset> {
        let chunk_size = u64::from(self.chunk_buffer_size) * u64::from(self.channel_count);
        if u64::from(layout.buffer_start_addr) + 2 * chunk_size > u64::from(layout.ram_size) {
            return Err(InvalidAsset::DoesNotFit {
                chunk_size,
                start: layout.buffer_start_addr,
                ram_size: layout.ram_size,
            });
        }

        let needed = chunk_size * u64::from(self.chunk_count);
        if (payload_len as u64) < needed {
            return Err(InvalidAsset::TruncatedPayload {
                len: payload_len,
                chunk_count: self.chunk_count,
                needed,
            });
        }
        Ok(())
    }
}

/// Split an asset into its header and payload, validating everything the
/// loader relies on
pub(crate) fn split_asset(
    asset: &[u8],
    layout: &LayoutConfig,
) -> Result<(AssetHeader, StreamGeometry), InvalidAsset> {
    if asset.len() < HEADER_REGION_SIZE {
        return Err(InvalidAsset::TooShort {
            len: asset.len(),
            needed: HEADER_REGION_SIZE,
        });
    }
    let header = AssetHeader::parse(asset)?;
    let geometry = header.geometry()?;
    geometry.check_fits(layout, asset.len() - HEADER_REGION_SIZE)?;
    Ok((header, geometry))
}
