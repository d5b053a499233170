use std::time::Duration;

use serde::{Deserialize, Serialize};
use telemetry_common::duration_secs;

/// Flush thresholds of a [`TelemetryBuffer`](crate::TelemetryBuffer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferOptions {
    /// Time after the first item entered an empty buffer at which the buffer is flushed.
    #[serde(with = "duration_secs")]
    pub flush_timeout: Duration,
    /// Number of items at which the buffer is flushed immediately.
    pub max_item_count: usize,
    /// Total encoded size in bytes at which the buffer is flushed immediately.
    pub max_buffer_size_bytes: usize,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            flush_timeout: Duration::from_secs(5),
            max_item_count: 100,
            max_buffer_size_bytes: 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options: BufferOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, BufferOptions::default());
        assert_eq!(options.flush_timeout, Duration::from_secs(5));
        assert_eq!(options.max_item_count, 100);
        assert_eq!(options.max_buffer_size_bytes, 1_048_576);
    }

    #[test]
    fn test_partial_override() {
        let options: BufferOptions =
            serde_json::from_str(r#"{"flush_timeout": 0.25, "max_item_count": 10}"#).unwrap();
        assert_eq!(options.flush_timeout, Duration::from_millis(250));
        assert_eq!(options.max_item_count, 10);
        assert_eq!(options.max_buffer_size_bytes, 1_048_576);
    }
}
