//! Stream engine configuration that downstream crates can serialize/deserialize.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_CAPACITY: usize = 128;
pub const DEFAULT_PARALLELISM: usize = 4;
pub const DEFAULT_SORT_WINDOW_ROWS: usize = 4096;
pub const DEFAULT_SPILL_FRAME_ROWS: usize = 256;

const SPILL_CODECS: &[&str] = &["none", "zstd", "lz4"];

/// Defaults resolved from the environment once per process.
static PROCESS_DEFAULTS: Lazy<StreamConfig> = Lazy::new(StreamConfig::from_env);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bounded capacity of every stream created from a context. Writers block
    /// once this many values are queued.
    pub capacity: usize,

    /// Fan-out degree for the parallel membership operators
    /// (intersection, subtraction, cartesian).
    pub parallelism: usize,

    /// Rows per in-memory window during external sort run generation.
    pub sort_window_rows: usize,

    /// Rows per serialized frame inside a spill segment. Bounds the memory a
    /// lazy run reader holds at once.
    pub spill_frame_rows: usize,

    /// Scratch directory for external sort segments.
    pub spill_dir: String,

    /// Spill codec name: `none`, `zstd`, or `lz4`.
    pub spill_codec: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            parallelism: DEFAULT_PARALLELISM,
            sort_window_rows: DEFAULT_SORT_WINDOW_ROWS,
            spill_frame_rows: DEFAULT_SPILL_FRAME_ROWS,
            spill_dir: std::env::temp_dir()
                .join("sluice-spill")
                .to_string_lossy()
                .into_owned(),
            spill_codec: "none".to_string(),
        }
    }
}

impl StreamConfig {
    /// Process-wide defaults (built-in values overlaid with environment
    /// variables, read once).
    pub fn process_default() -> Self {
        PROCESS_DEFAULTS.clone()
    }

    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SLUICE_STREAM_CAPACITY`: bounded stream capacity
    /// - `SLUICE_PARALLELISM`: fan-out degree for membership operators
    /// - `SLUICE_SORT_WINDOW_ROWS`: external sort window size
    /// - `SLUICE_SPILL_FRAME_ROWS`: rows per spill frame
    /// - `SLUICE_SPILL_DIR`: scratch directory
    /// - `SLUICE_SPILL_CODEC`: spill codec name
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_usize("SLUICE_STREAM_CAPACITY") {
            cfg.capacity = v;
        }

        if let Some(v) = env_usize("SLUICE_PARALLELISM") {
            cfg.parallelism = v;
        }

        if let Some(v) = env_usize("SLUICE_SORT_WINDOW_ROWS") {
            cfg.sort_window_rows = v;
        }

        if let Some(v) = env_usize("SLUICE_SPILL_FRAME_ROWS") {
            cfg.spill_frame_rows = v;
        }

        if let Ok(s) = std::env::var("SLUICE_SPILL_DIR") {
            cfg.spill_dir = s;
        }

        if let Ok(s) = std::env::var("SLUICE_SPILL_CODEC") {
            cfg.spill_codec = normalize_codec(&s);
        }

        cfg
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_sort_window_rows(mut self, rows: usize) -> Self {
        self.sort_window_rows = rows;
        self
    }

    pub fn with_spill_frame_rows(mut self, rows: usize) -> Self {
        self.spill_frame_rows = rows;
        self
    }

    pub fn with_spill_dir(mut self, dir: impl Into<String>) -> Self {
        self.spill_dir = dir.into();
        self
    }

    pub fn with_spill_codec(mut self, codec: impl Into<String>) -> Self {
        self.spill_codec = normalize_codec(&codec.into());
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".into()));
        }
        if self.parallelism == 0 {
            return Err(Error::Config("parallelism must be at least 1".into()));
        }
        if self.sort_window_rows == 0 {
            return Err(Error::Config("sort_window_rows must be at least 1".into()));
        }
        if self.spill_frame_rows == 0 {
            return Err(Error::Config("spill_frame_rows must be at least 1".into()));
        }
        if self.spill_dir.trim().is_empty() {
            return Err(Error::Config("spill_dir must not be empty".into()));
        }
        if !SPILL_CODECS.contains(&normalize_codec(&self.spill_codec).as_str()) {
            return Err(Error::Config(format!(
                "unknown spill codec '{}' (expected one of {:?})",
                self.spill_codec, SPILL_CODECS
            )));
        }
        Ok(())
    }
}

// Codec names are matched case-insensitively, as `Codec::from_name` does.
fn normalize_codec(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<usize>().ok())
}
