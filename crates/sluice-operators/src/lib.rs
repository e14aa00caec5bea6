#![forbid(unsafe_code)]
//! sluice-operators: streaming operators over bounded, closable streams.
//!
//! Design intent:
//! - Every operator spawns exactly one task (a named OS thread) that drains
//!   its input, transforms, and writes to a fresh output stream. Dropping the
//!   task's `Emitter` closes the output, so closure happens exactly once on
//!   every exit path.
//! - Backpressure is the only flow control: streams are bounded and writers
//!   block when full.
//! - Ordered algorithms (`ordered`, `join`) trust their sortedness
//!   precondition; `ordered::checked` can verify it.
//! - Cancellation travels with the `Context` every stream is created from.

pub mod stream;
pub mod traits;

pub mod filter;
pub mod map;
pub mod window;
pub mod zip;

pub mod join;
pub mod ordered;
pub mod set;
pub mod sort;

pub use stream::{Context, Emitter, Halted, Stream};
pub use traits::{Compare, OpError};
