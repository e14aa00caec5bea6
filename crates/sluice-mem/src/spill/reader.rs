//! Lazy, frame-at-a-time reader over a spilled segment.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::codec;
use super::segment::{le_array, SegmentHeader, SegmentMeta, FRAME_PREFIX_LEN, HEADER_LEN, MAX_FRAME_BYTES};
use super::Storage;
use crate::error::{Error, Result};
use crate::tracking::{ResidencyGuard, ResidencyTracker};

/// Iterator over the records of one segment.
///
/// Holds at most one decoded frame in memory. The checksum is accumulated
/// while reading and verified once the last frame has been consumed, so a
/// corrupt segment surfaces as a trailing `Err` item. Iteration stops after
/// the first error.
pub struct RunReader<T> {
    storage: Arc<dyn Storage>,
    meta: SegmentMeta,
    header: SegmentHeader,
    offset: u64,
    frames_left: u32,
    rows_seen: u64,
    buffer: VecDeque<T>,
    hasher: blake3::Hasher,
    residency: Option<ResidencyGuard>,
    finished: bool,
}

impl<T: DeserializeOwned> RunReader<T> {
    pub fn open(storage: Arc<dyn Storage>, meta: SegmentMeta) -> Result<Self> {
        let header_bytes = read_exact(storage.as_ref(), &meta.path, 0, HEADER_LEN)?;
        let header = SegmentHeader::from_bytes(&meta.path, &header_bytes)?;
        if header.codec != meta.codec || header.frames != meta.frames || header.rows != meta.rows {
            return Err(Error::Corrupt {
                path: meta.path.clone(),
                reason: "header disagrees with segment metadata".into(),
            });
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(&header_bytes);

        Ok(Self {
            storage,
            frames_left: header.frames,
            header,
            meta,
            offset: HEADER_LEN as u64,
            rows_seen: 0,
            buffer: VecDeque::new(),
            hasher,
            residency: None,
            finished: false,
        })
    }

    /// Account decoded-but-unconsumed records against `tracker`.
    pub fn track_with(mut self, tracker: &ResidencyTracker) -> Self {
        self.residency = Some(tracker.acquire(self.buffer.len(), "run_reader"));
        self
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    fn load_frame(&mut self) -> Result<()> {
        let path = self.meta.path.as_str();
        let prefix = read_exact(self.storage.as_ref(), path, self.offset, FRAME_PREFIX_LEN)?;
        let len = u32::from_le_bytes(le_array(&prefix)) as usize;
        if len > MAX_FRAME_BYTES {
            return Err(Error::Corrupt {
                path: path.to_string(),
                reason: format!("frame length {len} exceeds limit"),
            });
        }
        let payload = read_exact(
            self.storage.as_ref(),
            path,
            self.offset + FRAME_PREFIX_LEN as u64,
            len,
        )?;
        self.hasher.update(&prefix);
        self.hasher.update(&payload);
        self.offset += (FRAME_PREFIX_LEN + len) as u64;
        self.frames_left -= 1;

        let raw = codec::decompress(self.header.codec, &payload)?;
        let rows: Vec<T> = serde_json::from_slice(&raw)
            .map_err(|e| Error::Codec(format!("json deserialize: {e}")))?;
        if rows.is_empty() {
            return Err(Error::Corrupt {
                path: path.to_string(),
                reason: "empty frame".into(),
            });
        }
        self.rows_seen += rows.len() as u64;
        self.buffer.extend(rows);
        Ok(())
    }

    fn verify(&mut self) -> Result<()> {
        if self.rows_seen != self.header.rows {
            return Err(Error::Corrupt {
                path: self.meta.path.clone(),
                reason: format!("expected {} rows, read {}", self.header.rows, self.rows_seen),
            });
        }
        let computed: [u8; 32] = self.hasher.finalize().into();
        if computed != self.meta.checksum {
            return Err(Error::ChecksumMismatch(self.meta.path.clone()));
        }
        Ok(())
    }

    fn sync_residency(&mut self) {
        if let Some(guard) = self.residency.as_mut() {
            guard.resize(self.buffer.len());
        }
    }
}

impl<T: DeserializeOwned> Iterator for RunReader<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if let Some(row) = self.buffer.pop_front() {
                self.sync_residency();
                return Some(Ok(row));
            }
            if self.frames_left == 0 {
                self.finished = true;
                return self.verify().err().map(Err);
            }
            if let Err(e) = self.load_frame() {
                self.finished = true;
                self.buffer.clear();
                self.sync_residency();
                return Some(Err(e));
            }
            self.sync_residency();
        }
    }
}

fn read_exact(storage: &dyn Storage, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
    let bytes = storage.read_range(path, offset, len)?;
    if bytes.len() != len {
        return Err(Error::Corrupt {
            path: path.to_string(),
            reason: format!("truncated at offset {offset}: wanted {len} bytes, got {}", bytes.len()),
        });
    }
    Ok(bytes)
}
