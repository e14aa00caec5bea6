#![forbid(unsafe_code)]
//! sluice-io: storage backends for spill segments.
//!
//! `FsStorage` writes to a local scratch directory; `MemoryStorage` keeps
//! everything in a map and is meant for tests.

pub mod memory_storage;
pub mod storage;

pub use memory_storage::MemoryStorage;
pub use storage::FsStorage;
