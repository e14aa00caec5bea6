//! Shared operator vocabulary: the comparator bound and the operator error.

use std::cmp::Ordering;

use thiserror::Error;

/// Three-way comparator supplied by callers of the ordered algorithms.
///
/// Any `Fn(&T, &T) -> Ordering` that can be shared across tasks qualifies.
pub trait Compare<T>: Fn(&T, &T) -> Ordering + Send + Sync + 'static {}

impl<T, F> Compare<T> for F where F: Fn(&T, &T) -> Ordering + Send + Sync + 'static {}

#[derive(Debug, Error)]
pub enum OpError {
    #[error("configuration error: {0}")]
    Config(#[from] sluice_core::Error),

    #[error("spill error: {0}")]
    Spill(#[from] sluice_mem::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to spawn task '{name}': {reason}")]
    Spawn { name: &'static str, reason: String },

    #[error("task '{0}' panicked")]
    TaskPanicked(&'static str),
}
