//! Spill manager for external-memory operators.
//!
//! Writes sorted runs of serializable records to storage as framed,
//! checksummed segments and hands out lazy readers over them.

pub mod codec;
pub mod reader;
pub mod segment;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sluice_core::id::RunId;

use crate::error::{Error, Result};

pub use codec::Codec;
pub use reader::RunReader;
pub use segment::{SegmentHeader, SegmentMeta, SegmentName, FRAME_PREFIX_LEN, HEADER_LEN};

/// Abstract storage interface for spill segments.
///
/// Implemented by `sluice-io::FsStorage` for local scratch directories and by
/// `sluice-io::MemoryStorage` for tests.
pub trait Storage: Send + Sync {
    /// Write bytes to a path. Creates parent directories if needed.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read a byte range from a path. May return fewer than `len` bytes at
    /// end of file.
    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Delete a path. Idempotent (no error if path doesn't exist).
    fn delete(&self, path: &str) -> Result<()>;

    /// List all paths under a prefix.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Size of a path in bytes.
    fn size(&self, path: &str) -> Result<u64>;

    /// Remove everything under a prefix, including the prefix itself when the
    /// backend has directories.
    fn delete_prefix(&self, prefix: &str) -> Result<()> {
        for path in self.list(prefix)? {
            self.delete(&path)?;
        }
        Ok(())
    }
}

/// Owns the segments of one external-memory operation.
///
/// Every segment written through the manager is tracked and removed by
/// [`SpillManager::cleanup`], which also runs on drop. Callers that want to
/// observe cleanup failures call it explicitly.
pub struct SpillManager {
    storage: Arc<dyn Storage>,
    codec: Codec,
    root_dir: String,
    run_id: RunId,
    frame_rows: usize,
    next_run: AtomicU32,
    segments: HashMap<SegmentName, SegmentMeta>,
    cleaned: bool,
}

impl SpillManager {
    /// Create a manager writing under `root_dir`, which must be private to
    /// this operation.
    pub fn new(storage: Arc<dyn Storage>, codec: Codec, root_dir: String, run_id: RunId) -> Self {
        Self {
            storage,
            codec,
            root_dir,
            run_id,
            frame_rows: sluice_core::config::DEFAULT_SPILL_FRAME_ROWS,
            next_run: AtomicU32::new(0),
            segments: HashMap::new(),
            cleaned: false,
        }
    }

    pub fn with_frame_rows(mut self, frame_rows: usize) -> Self {
        self.frame_rows = frame_rows.max(1);
        self
    }

    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Write one sorted run and return its metadata.
    ///
    /// Steps:
    /// 1. Split rows into frames of `frame_rows`
    /// 2. Serialize each frame with serde_json and compress with the codec
    /// 3. Prefix the segment header, length-prefix each frame
    /// 4. Compute a BLAKE3 checksum over the whole segment
    /// 5. Write to storage
    pub fn write_run<T: Serialize>(&mut self, rows: &[T]) -> Result<SegmentMeta> {
        let frames = rows.len().div_ceil(self.frame_rows);
        let frame_count = u32::try_from(frames)
            .map_err(|_| Error::Storage(format!("too many frames in run: {frames}")))?;
        let header = SegmentHeader::new(self.codec, rows.len() as u64, frame_count);

        let mut segment = header.to_bytes();
        for frame in rows.chunks(self.frame_rows) {
            let raw = serde_json::to_vec(frame)
                .map_err(|e| Error::Codec(format!("json serialize: {e}")))?;
            let payload = codec::compress(self.codec, &raw)?;
            let len = u32::try_from(payload.len())
                .map_err(|_| Error::Storage(format!("frame too large: {} bytes", payload.len())))?;
            segment.extend_from_slice(&len.to_le_bytes());
            segment.extend_from_slice(&payload);
        }
        let checksum: [u8; 32] = blake3::hash(&segment).into();

        let name = SegmentName::new(self.run_id, self.next_run_index());
        let path = format!("{}/{}.seg", self.root_dir, name.0);

        if let Err(e) = self.storage.write(&path, &segment) {
            // A partial write may have left a file behind.
            let _ = self.storage.delete(&path);
            return Err(e);
        }

        let meta = SegmentMeta {
            name: name.clone(),
            path,
            codec: self.codec,
            rows: rows.len() as u64,
            frames: frame_count,
            bytes: segment.len() as u64,
            checksum,
        };
        tracing::debug!(
            segment = %meta.path,
            rows = meta.rows,
            frames = meta.frames,
            bytes = meta.bytes,
            "spilled run"
        );
        self.segments.insert(name, meta.clone());
        Ok(meta)
    }

    /// Open a lazy reader over a segment written by this manager.
    pub fn open_run<T: DeserializeOwned>(&self, meta: &SegmentMeta) -> Result<RunReader<T>> {
        RunReader::open(Arc::clone(&self.storage), meta.clone())
    }

    /// Generate a unique run index for this spill session.
    pub fn next_run_index(&self) -> u32 {
        self.next_run.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove every tracked segment and the manager's root prefix. Returns the
    /// number of segments removed. Later calls are no-ops.
    pub fn cleanup(&mut self) -> Result<usize> {
        if self.cleaned {
            return Ok(0);
        }
        self.cleaned = true;

        let mut removed = 0;
        let mut first_err = None;
        for (_, meta) in self.segments.drain() {
            match self.storage.delete(&meta.path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(segment = %meta.path, error = %e, "failed to delete spill segment");
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Err(e) = self.storage.delete_prefix(&self.root_dir) {
            tracing::warn!(root = %self.root_dir, error = %e, "failed to remove spill root");
            first_err.get_or_insert(e);
        }
        tracing::debug!(root = %self.root_dir, removed, "spill cleanup");

        match first_err {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }
}

impl Drop for SpillManager {
    fn drop(&mut self) {
        // Errors were already logged by cleanup.
        let _ = self.cleanup();
    }
}
