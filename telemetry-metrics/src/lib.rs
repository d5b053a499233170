//! Aggregation of metrics into time buckets.
//!
//! Metric values are recorded through the [`MetricsApi`] from any thread. The
//! [`BucketAggregator`] merges values with the same identity observed within the same rollup
//! window of [`ROLLUP_IN_SECONDS`] into a single [`Metric`] and periodically hands expired buckets
//! to a [`MetricsClient`]. The [`EnvelopeMetricsClient`] encodes them in the statsd line protocol
//! and sends them as one envelope item.
//!
//! # Metric Types
//!
//!  - **Counter**: Sum of all reported values. Weighs `1`.
//!  - **Gauge**: Last, minimum, maximum, sum and count of reported values. Weighs `1`.
//!  - **Distribution**: Every reported value. Weighs the number of values.
//!  - **Set**: Unique integer values. Strings are hashed to 32 bits. Weighs the number of unique
//!    values.
//!
//! # Statsd Format
//!
//! ```text
//! app.start@second:1.5:2|d|#os:ios,screen:main|T1700000000
//! clicks@none:3|c|T1700000010
//! ```
//!
//! Every bucket is limited by the total weight of the aggregator. Once the number of bucket
//! timestamps plus the weight of all metrics reaches `total_max_weight`, all buckets are flushed.
#![warn(missing_docs)]

mod aggregator;
mod api;
mod bucket;
mod client;
mod protocol;
mod statsd;
#[cfg(test)]
mod testutils;

pub use self::aggregator::*;
pub use self::api::*;
pub use self::bucket::*;
pub use self::client::*;
pub use self::protocol::*;
pub use self::statsd::*;
