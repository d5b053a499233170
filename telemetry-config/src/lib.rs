//! Configuration of the telemetry core.
//!
//! A [`Config`] composes the options of the logging system, the telemetry buffers and the metrics
//! aggregator. It is loaded from a YAML (`.yml`, `.yaml`) or JSON (`.json`) file with
//! [`Config::from_path`]. Every section and field is optional and falls back to its default.
//!
//! ```yaml
//! logging:
//!   level: debug
//! sdk:
//!   environment: staging
//!   release: app@2.1.0
//! logs:
//!   flush_timeout: 5
//!   max_item_count: 100
//! metrics:
//!   enabled: true
//!   aggregator:
//!     total_max_weight: 1000
//!     flush_interval: 10
//!     flush_tolerance: 0.5
//! ```
//!
//! Durations are given in fractional seconds.
#![warn(missing_docs)]

mod config;

pub use self::config::*;
