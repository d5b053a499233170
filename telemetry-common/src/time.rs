//! Utilities to deal with wall-clock and monotonic time.

use std::fmt;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

/// A unix timestamp (full seconds elapsed since 1970-01-01 00:00 UTC).
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// Creates a unix timestamp from the given number of seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Creates a unix timestamp from the given system time.
    ///
    /// Times before the epoch saturate to `0`.
    pub fn from_system(time: SystemTime) -> Self {
        let duration = time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self(duration)
    }

    /// Returns the current timestamp.
    #[inline]
    pub fn now() -> Self {
        Self::from_system(SystemTime::now())
    }

    /// Returns the number of seconds since the UNIX epoch start.
    pub fn as_secs(self) -> u64 {
        self.0
    }

    /// Rounds the timestamp down to the start of its window of `window_secs` seconds.
    ///
    /// A window of `0` returns the timestamp unchanged.
    pub fn floor_to(self, window_secs: u64) -> Self {
        match window_secs {
            0 => self,
            w => Self(self.0 / w * w),
        }
    }
}

impl fmt::Debug for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnixTimestamp({})", self.as_secs())
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_secs().fmt(f)
    }
}

impl std::ops::Sub for UnixTimestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration::from_secs(self.0.saturating_sub(rhs.0))
    }
}

/// An error returned from parsing [`UnixTimestamp`].
#[derive(Debug)]
pub struct ParseUnixTimestampError(());

impl fmt::Display for ParseUnixTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid unix timestamp")
    }
}

impl std::error::Error for ParseUnixTimestampError {}

impl std::str::FromStr for UnixTimestamp {
    type Err = ParseUnixTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ts = s.parse().or(Err(ParseUnixTimestampError(())))?;
        Ok(Self(ts))
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.as_secs())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Self::from_secs(secs))
    }
}

/// Serializes a [`Duration`] as fractional seconds.
///
/// Use with `#[serde(with = "telemetry_common::duration_secs")]`.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes the duration as a floating point number of seconds.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    /// Deserializes a non-negative number of seconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Provider of the current time.
///
/// The buffering engines never read the system clock directly, so that tests can control time.
pub trait Clock: Send + Sync {
    /// Returns the current wall-clock time.
    fn now(&self) -> SystemTime;

    /// Returns a monotonic reading, used for measuring elapsed time.
    ///
    /// Only differences between two readings are meaningful.
    fn monotonic(&self) -> Duration;

    /// Returns the current wall-clock time as fractional seconds since the UNIX epoch.
    fn unix_secs_f64(&self) -> f64 {
        self.now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// The [`Clock`] backed by the operating system.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn monotonic(&self) -> Duration {
        self.start.elapsed()
    }
}

/// A manually driven [`Clock`] for tests.
///
/// Both the wall clock and the monotonic reading only move when the test calls
/// [`advance`](Self::advance) or [`set_secs`](Self::set_secs).
#[cfg(any(test, feature = "test"))]
#[derive(Debug)]
pub struct TestClock {
    inner: parking_lot::Mutex<(SystemTime, Duration)>,
}

#[cfg(any(test, feature = "test"))]
impl TestClock {
    /// Creates a clock frozen at the given number of seconds since the UNIX epoch.
    pub fn at_secs(secs: f64) -> Self {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs_f64(secs);
        Self {
            inner: parking_lot::Mutex::new((time, Duration::ZERO)),
        }
    }

    /// Moves both the wall clock and the monotonic reading forward.
    pub fn advance(&self, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.0 += duration;
        inner.1 += duration;
    }

    /// Moves both the wall clock and the monotonic reading forward by fractional seconds.
    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    /// Sets the wall clock to the given number of seconds since the UNIX epoch.
    ///
    /// The monotonic reading is not affected.
    pub fn set_secs(&self, secs: f64) {
        self.inner.lock().0 = SystemTime::UNIX_EPOCH + Duration::from_secs_f64(secs);
    }
}

#[cfg(any(test, feature = "test"))]
impl Clock for TestClock {
    fn now(&self) -> SystemTime {
        self.inner.lock().0
    }

    fn monotonic(&self) -> Duration {
        self.inner.lock().1
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timeout {
        #[serde(with = "duration_secs")]
        timeout: Duration,
    }

    #[test]
    fn test_duration_secs() {
        let parsed: Timeout = serde_json::from_str(r#"{"timeout": 0.5}"#).unwrap();
        assert_eq!(parsed.timeout, Duration::from_millis(500));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"{"timeout":0.5}"#);
        assert!(serde_json::from_str::<Timeout>(r#"{"timeout": -1}"#).is_err());
    }

    #[test]
    fn test_floor_to_window() {
        let ts = UnixTimestamp::from_secs(1_700_000_019);
        assert_eq!(ts.floor_to(10), UnixTimestamp::from_secs(1_700_000_010));
        assert_eq!(ts.floor_to(0), ts);
    }

    #[test]
    fn test_from_system_before_epoch() {
        let time = SystemTime::UNIX_EPOCH - Duration::from_secs(5);
        assert_eq!(UnixTimestamp::from_system(time).as_secs(), 0);
    }

    #[test]
    fn test_parse_and_display() {
        let ts: UnixTimestamp = "1700000000".parse().unwrap();
        assert_eq!(ts.to_string(), "1700000000");
        assert!("nope".parse::<UnixTimestamp>().is_err());
    }

    #[test]
    fn test_clock_advance() {
        let clock = TestClock::at_secs(1_700_000_000.0);
        clock.advance_secs(2.5);
        assert_eq!(clock.unix_secs_f64(), 1_700_000_002.5);
        assert_eq!(clock.monotonic(), Duration::from_millis(2500));

        clock.set_secs(1_600_000_000.0);
        assert_eq!(clock.unix_secs_f64(), 1_600_000_000.0);
        assert_eq!(clock.monotonic(), Duration::from_millis(2500));
    }
}
