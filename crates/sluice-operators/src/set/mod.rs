//! Unordered fan-in and set operators.
//!
//! None of these preserve order across their inputs. Intersection,
//! subtraction, and cartesian materialize their right-hand side in memory
//! first; pass the smaller stream there.

pub mod cartesian;
pub mod membership;
pub mod union;

pub use union::union;
