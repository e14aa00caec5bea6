#![forbid(unsafe_code)]
//! sluice-exec: pipelines over sluice streams.
//!
//! A [`Pipeline`] is an ordered list of named steps plus an optional source
//! and sink. `compute` folds the steps over a stream the caller already has;
//! `run` wires source, steps and sink together and waits for the sink.

pub mod adapters;
pub mod metrics;
pub mod pipeline;

pub use adapters::{IterSource, Sink, Source, VecSink};
pub use pipeline::{ExecError, Pipeline, RunStats};
