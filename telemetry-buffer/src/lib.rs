//! Batching of structured telemetry items.
//!
//! The central type is [`TelemetryBuffer`]. It accepts logs and trace metrics from any thread,
//! enriches them with [`TelemetryScope`] data, encodes them into a [`BatchBuffer`] on a serial
//! queue, and hands the resulting batch to a sink once a count, size or time threshold is reached.
//!
//! ```text
//! add(item, scope) -> apply_to_item -> before_send_item -> (serial queue) -> BatchBuffer
//!     -> flush -> captured_data_callback(batch, count) -> TelemetryScheduler -> Transport
//! ```
//!
//! [`TelemetryProcessor`] wires one buffer per telemetry kind to a transport, and
//! [`ForwardingTriggers`] flush buffers when the application is about to leave the foreground.
#![warn(missing_docs)]

mod attribute;
mod buffer;
mod item;
mod options;
mod processor;
mod scheduler;
mod scope;
mod store;
mod triggers;

pub use self::attribute::*;
pub use self::buffer::*;
pub use self::item::*;
pub use self::options::*;
pub use self::processor::*;
pub use self::scheduler::*;
pub use self::scope::*;
pub use self::store::*;
pub use self::triggers::*;
