//! Serial execution primitives for the telemetry core.
//!
//! Mutable state of the buffering engines is owned by a [`DispatchQueue`]. Producers on arbitrary
//! threads submit closures to the queue, which runs them one at a time in submission order with
//! exclusive access to the state. Besides immediate execution, queues support delayed and
//! repeating timers, each referred to through a cancellable [`TimerHandle`].
//!
//! The production implementation is [`SerialQueue`], which runs a dedicated worker thread. With
//! the `test` feature, [`TestDispatchQueue`] runs tasks inline and lets tests fire timers
//! explicitly.
#![warn(missing_docs)]

mod queue;
mod serial;
#[cfg(any(test, feature = "test"))]
mod testutils;
mod timer;

pub use self::queue::*;
pub use self::serial::*;
#[cfg(any(test, feature = "test"))]
pub use self::testutils::*;
pub use self::timer::*;
