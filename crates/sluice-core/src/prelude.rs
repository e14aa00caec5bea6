//! Convenient re-exports for downstream crates.

pub use crate::cancel::CancelToken;
pub use crate::config::StreamConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{RunId, StepId};
