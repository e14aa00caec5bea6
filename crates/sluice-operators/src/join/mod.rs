//! Sort-merge joins over pre-sorted streams.
//!
//! Precondition: both inputs are non-decreasing under the join comparator.
//! Only the current key group of the right-hand side is buffered.

pub mod merge;
