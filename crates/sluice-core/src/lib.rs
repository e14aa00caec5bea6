#![forbid(unsafe_code)]
//! sluice-core: shared vocabulary for the sluice stream engine.
//!
//! Holds configuration, strongly typed ids, the cancellation token that every
//! stream graph carries, and the core error type. No threads and no IO live
//! here; the operator and spill crates build on top of these types.

pub mod cancel;
pub mod config;
pub mod error;
pub mod id;
pub mod prelude;

pub use cancel::CancelToken;
pub use config::StreamConfig;
pub use error::{Error, Result};
