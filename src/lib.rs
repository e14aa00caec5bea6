#![forbid(unsafe_code)]
//! sluice: a streaming pipeline engine.
//!
//! Operators run as tasks connected by bounded streams; writes block when a
//! stream is full. On top of that the engine provides k-way merge, sorted
//! set operations, sort-merge joins and a disk-backed external sort.
//!
//! ```no_run
//! use sluice::prelude::*;
//!
//! let ctx = Context::default();
//! let evens: Vec<u64> = ctx.from_iter(0..10u64).filter(|x| x % 2 == 0).collect();
//! assert_eq!(evens, vec![0, 2, 4, 6, 8]);
//! ```

pub use sluice_core;
pub use sluice_exec as exec;
pub use sluice_io as io;
pub use sluice_mem as mem;
pub use sluice_operators as operators;

pub use sluice_core::{CancelToken, StreamConfig};
pub use sluice_exec::{ExecError, IterSource, Pipeline, RunStats, Sink, Source, VecSink};
pub use sluice_operators::sort::{ExternalSort, SortError, SortSummary, SortedStream};
pub use sluice_operators::{Context, Emitter, Halted, OpError, Stream};

pub mod prelude {
    pub use sluice_core::StreamConfig;
    pub use sluice_exec::{IterSource, Pipeline, Sink, Source, VecSink};
    pub use sluice_operators::ordered::{checked, merge};
    pub use sluice_operators::set::union;
    pub use sluice_operators::sort::ExternalSort;
    pub use sluice_operators::{Context, Emitter, Stream};
}
