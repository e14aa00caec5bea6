//! Storage backends implementing `sluice_mem::Storage`.

pub mod fs;

pub use fs::FsStorage;
