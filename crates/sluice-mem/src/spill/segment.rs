//! Segment file header and metadata.
//!
//! Layout on disk:
//! [ magic: u32 ][ version: u16 ][ codec: u8 ][ reserved: u8 ]
//! [ rows: u64 ][ frames: u32 ]
//! then `frames` times: [ payload_len: u32 ][ payload bytes … ]
//!
//! Each payload is a codec-compressed JSON array of at most `frame_rows`
//! records. End-to-end checksum is computed over the whole segment using
//! blake3 and kept in [`SegmentMeta`].

use serde::{Deserialize, Serialize};

use super::Codec;
use crate::error::{Error, Result};

pub const MAGIC: u32 = 0x534C_4345; // "SLCE"
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 1 + 1 + 8 + 4;
pub const FRAME_PREFIX_LEN: usize = 4;

/// Upper bound on a single frame payload; anything larger is treated as corruption.
pub const MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub magic: u32,
    pub version: u16,
    pub codec: Codec,
    pub rows: u64,
    pub frames: u32,
}

impl SegmentHeader {
    pub fn new(codec: Codec, rows: u64, frames: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            codec,
            rows,
            frames,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(&self.magic.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(self.codec as u8);
        out.push(0u8); // reserved
        out.extend_from_slice(&self.rows.to_le_bytes());
        out.extend_from_slice(&self.frames.to_le_bytes());
        out
    }

    /// Parse a header read from the segment at `path`.
    pub fn from_bytes(path: &str, bytes: &[u8]) -> Result<Self> {
        let corrupt = |reason: &str| Error::Corrupt {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        if bytes.len() < HEADER_LEN {
            return Err(corrupt("short header"));
        }
        let magic = u32::from_le_bytes(le_array(&bytes[0..4]));
        let version = u16::from_le_bytes(le_array(&bytes[4..6]));
        let codec = Codec::from_u8(bytes[6])?;
        // bytes[7] reserved
        let rows = u64::from_le_bytes(le_array(&bytes[8..16]));
        let frames = u32::from_le_bytes(le_array(&bytes[16..20]));

        if magic != MAGIC || version != VERSION {
            return Err(corrupt("bad magic/version"));
        }

        Ok(Self {
            magic,
            version,
            codec,
            rows,
            frames,
        })
    }
}

/// Copy a fixed-width little-endian field out of a slice whose length the
/// caller has already checked.
pub(crate) fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Human-friendly name for a segment, derived from a run id and a run index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentName(pub String);

impl SegmentName {
    pub fn new(id: sluice_core::id::RunId, run_index: u32) -> Self {
        SegmentName(format!("sort{}_run{}", id.get(), run_index))
    }
}

/// Metadata the engine keeps for a spilled segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMeta {
    pub name: SegmentName,
    pub path: String,
    pub codec: Codec,
    pub rows: u64,
    pub frames: u32,
    pub bytes: u64,
    pub checksum: [u8; 32],
}
