//! Algorithms over streams that are already sorted by a caller-supplied
//! comparator.
//!
//! Precondition for everything here: each input is non-decreasing under the
//! comparator (pass a reversed comparator for descending inputs). Unsorted
//! input produces unspecified output and is not detected; wrap an input in
//! [`checked`] to detect it.

pub mod checked;
pub mod merge;
pub mod sorted_set;

pub use checked::{checked, OrderReport, OrderViolation};
pub use merge::{merge, merge_sources};
