//! Sorting: a stable in-memory sort and a disk-backed external sort.

pub mod external;
pub mod in_memory;
pub mod run;

pub use external::{ExternalSort, SortHandle, SortSummary, SortedStream};
pub use in_memory::sort_by;

/// Error reported by [`SortedStream::finish`].
pub type SortError = crate::traits::OpError;
