//! Common functionality for the telemetry core.
//!
//! This crate holds the leaves of the dependency graph: the current-time provider, randomness,
//! trace identifiers and the envelope transport interface the buffering engines hand their
//! batches to.
#![warn(missing_docs)]

#[macro_use]
mod macros;

mod envelope;
mod ids;
mod random;
mod time;

pub use crate::envelope::*;
pub use crate::ids::*;
pub use crate::random::*;
pub use crate::time::*;
