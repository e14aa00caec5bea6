use thiserror::Error;

/// Result type local to sluice-mem.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("spill storage error: {0}")]
    Storage(String),

    #[error("unsupported codec: {0}")]
    CodecUnsupported(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("corrupt segment '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    #[error("checksum mismatch for segment '{0}'")]
    ChecksumMismatch(String),
}
