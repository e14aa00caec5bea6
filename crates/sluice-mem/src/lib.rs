#![forbid(unsafe_code)]
//! sluice-mem: spill manager and residency tracking.
//!
//! External-memory operators write sorted runs through [`SpillManager`] and
//! read them back lazily with [`RunReader`]. Storage backends implement the
//! [`Storage`] trait (see `sluice-io`). [`ResidencyTracker`] counts how many
//! elements an operator holds in memory and remembers the peak.

pub mod error;
pub mod spill;
pub mod tracking;

pub use error::{Error, Result};
pub use spill::{Codec, RunReader, SegmentMeta, SpillManager, Storage};
pub use tracking::{ResidencyGuard, ResidencyTracker};
