use std::fmt;
use std::hash::Hasher as _;

use hash32::{FnvHasher, Hasher as _};

/// Type used for Counter metric
pub type CounterType = f64;

/// Type of distribution entries
pub type DistributionType = f64;

/// Type used for set elements in Set metric
pub type SetType = u64;

/// Type used for Gauge entries
pub type GaugeType = f64;

/// An error returned when parsing a [`MetricType`] or [`MetricUnit`] fails.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseMetricError {
    /// The metric type shortcode is not known.
    #[error("unknown metric type `{0}`")]
    UnknownType(String),
    /// A custom unit contains characters other than ASCII alphanumerics and underscores.
    #[error("invalid metric unit `{0}`")]
    InvalidUnit(String),
}

/// The type of a metric, determining its aggregation and evaluation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum MetricType {
    /// Counts instances of an event.
    ///
    /// Counters can be incremented and decremented. The default operation is to increment a counter
    /// by `1`, although increments by larger values are equally possible.
    Counter,
    /// Builds a statistical distribution over values reported.
    Distribution,
    /// Counts the number of unique reported values.
    ///
    /// Sets allow sending arbitrary discrete values, including strings, and store the deduplicated
    /// count. It is not possible to query individual values from a set.
    Set,
    /// Stores absolute snapshots of values.
    ///
    /// In addition to plain [counters](Self::Counter), gauges store a snapshot of the maximum,
    /// minimum and sum of all values, as well as the last reported value.
    Gauge,
}

impl MetricType {
    /// Return the shortcode for this metric type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "c",
            MetricType::Distribution => "d",
            MetricType::Set => "s",
            MetricType::Gauge => "g",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricType {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "c" => Self::Counter,
            "d" => Self::Distribution,
            "s" => Self::Set,
            "g" => Self::Gauge,
            _ => return Err(ParseMetricError::UnknownType(s.to_owned())),
        })
    }
}

telemetry_common::impl_str_serde!(MetricType, "a metric type string");

/// Time duration units used in [`MetricUnit::Duration`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum DurationUnit {
    /// Nanosecond (`"nanosecond"`), 10^-9 seconds.
    NanoSecond,
    /// Microsecond (`"microsecond"`), 10^-6 seconds.
    MicroSecond,
    /// Millisecond (`"millisecond"`), 10^-3 seconds.
    MilliSecond,
    /// Full second (`"second"`).
    Second,
    /// Minute (`"minute"`), 60 seconds.
    Minute,
    /// Hour (`"hour"`), 3600 seconds.
    Hour,
    /// Day (`"day"`), 86,400 seconds.
    Day,
    /// Week (`"week"`), 604,800 seconds.
    Week,
}

impl DurationUnit {
    fn as_str(&self) -> &'static str {
        match self {
            Self::NanoSecond => "nanosecond",
            Self::MicroSecond => "microsecond",
            Self::MilliSecond => "millisecond",
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

/// Size of information derived from bytes, used in [`MetricUnit::Information`].
///
/// SI units use powers of 1000, IEC units powers of 1024.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum InformationUnit {
    /// Bit (`"bit"`), corresponding to 1/8 of a byte.
    Bit,
    /// Byte (`"byte"`).
    Byte,
    /// Kilobyte (`"kilobyte"`), 10^3 bytes.
    KiloByte,
    /// Kibibyte (`"kibibyte"`), 2^10 bytes.
    KibiByte,
    /// Megabyte (`"megabyte"`), 10^6 bytes.
    MegaByte,
    /// Mebibyte (`"mebibyte"`), 2^20 bytes.
    MebiByte,
    /// Gigabyte (`"gigabyte"`), 10^9 bytes.
    GigaByte,
    /// Gibibyte (`"gibibyte"`), 2^30 bytes.
    GibiByte,
    /// Terabyte (`"terabyte"`), 10^12 bytes.
    TeraByte,
    /// Tebibyte (`"tebibyte"`), 2^40 bytes.
    TebiByte,
    /// Petabyte (`"petabyte"`), 10^15 bytes.
    PetaByte,
    /// Pebibyte (`"pebibyte"`), 2^50 bytes.
    PebiByte,
    /// Exabyte (`"exabyte"`), 10^18 bytes.
    ExaByte,
    /// Exbibyte (`"exbibyte"`), 2^60 bytes.
    ExbiByte,
}

impl InformationUnit {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Bit => "bit",
            Self::Byte => "byte",
            Self::KiloByte => "kilobyte",
            Self::KibiByte => "kibibyte",
            Self::MegaByte => "megabyte",
            Self::MebiByte => "mebibyte",
            Self::GigaByte => "gigabyte",
            Self::GibiByte => "gibibyte",
            Self::TeraByte => "terabyte",
            Self::TebiByte => "tebibyte",
            Self::PetaByte => "petabyte",
            Self::PebiByte => "pebibyte",
            Self::ExaByte => "exabyte",
            Self::ExbiByte => "exbibyte",
        }
    }
}

/// Units of fraction used in [`MetricUnit::Fraction`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum FractionUnit {
    /// Floating point fraction of `1`.
    Ratio,
    /// Ratio expressed as a fraction of `100`. `100%` equals a ratio of `1.0`.
    Percent,
}

impl FractionUnit {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ratio => "ratio",
            Self::Percent => "percent",
        }
    }
}

/// The unit of measurement of a metric value.
///
/// Units are part of a metric's identity. The same key recorded with two different units yields
/// two separate metrics.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MetricUnit {
    /// A time duration.
    Duration(DurationUnit),
    /// Size of information derived from bytes.
    Information(InformationUnit),
    /// Fractions such as percentages.
    Fraction(FractionUnit),
    /// A user-defined unit, restricted to ASCII alphanumerics and underscores.
    Custom(String),
    /// Untyped value without a unit (`"none"`).
    #[default]
    None,
}

impl MetricUnit {
    /// Returns `true` if this is the `none` unit.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Creates a custom unit after validating its characters.
    pub fn custom(unit: &str) -> Result<Self, ParseMetricError> {
        if unit.is_empty() || !unit.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ParseMetricError::InvalidUnit(unit.to_owned()));
        }
        Ok(Self::Custom(unit.to_owned()))
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricUnit::Duration(u) => f.write_str(u.as_str()),
            MetricUnit::Information(u) => f.write_str(u.as_str()),
            MetricUnit::Fraction(u) => f.write_str(u.as_str()),
            MetricUnit::Custom(u) => f.write_str(u),
            MetricUnit::None => f.write_str("none"),
        }
    }
}

impl std::str::FromStr for MetricUnit {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "nanosecond" | "ns" => Self::Duration(DurationUnit::NanoSecond),
            "microsecond" => Self::Duration(DurationUnit::MicroSecond),
            "millisecond" | "ms" => Self::Duration(DurationUnit::MilliSecond),
            "second" | "s" => Self::Duration(DurationUnit::Second),
            "minute" => Self::Duration(DurationUnit::Minute),
            "hour" => Self::Duration(DurationUnit::Hour),
            "day" => Self::Duration(DurationUnit::Day),
            "week" => Self::Duration(DurationUnit::Week),

            "bit" => Self::Information(InformationUnit::Bit),
            "byte" => Self::Information(InformationUnit::Byte),
            "kilobyte" => Self::Information(InformationUnit::KiloByte),
            "kibibyte" => Self::Information(InformationUnit::KibiByte),
            "megabyte" => Self::Information(InformationUnit::MegaByte),
            "mebibyte" => Self::Information(InformationUnit::MebiByte),
            "gigabyte" => Self::Information(InformationUnit::GigaByte),
            "gibibyte" => Self::Information(InformationUnit::GibiByte),
            "terabyte" => Self::Information(InformationUnit::TeraByte),
            "tebibyte" => Self::Information(InformationUnit::TebiByte),
            "petabyte" => Self::Information(InformationUnit::PetaByte),
            "pebibyte" => Self::Information(InformationUnit::PebiByte),
            "exabyte" => Self::Information(InformationUnit::ExaByte),
            "exbibyte" => Self::Information(InformationUnit::ExbiByte),

            "ratio" => Self::Fraction(FractionUnit::Ratio),
            "percent" => Self::Fraction(FractionUnit::Percent),

            "" | "none" => Self::None,
            _ => Self::custom(s)?,
        })
    }
}

telemetry_common::impl_str_serde!(MetricUnit, "a metric unit string");

/// Hashes the given set value.
///
/// Sets only guarantee 32-bit accuracy, but arbitrary strings are allowed on the protocol. Upon
/// parsing, they are hashed and only used as hashes subsequently.
pub fn hash_set_value(string: &str) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(string.as_bytes());
    hasher.finish32()
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_metric_type_roundtrip() {
        for ty in [
            MetricType::Counter,
            MetricType::Distribution,
            MetricType::Set,
            MetricType::Gauge,
        ] {
            assert_eq!(ty.as_str().parse::<MetricType>().unwrap(), ty);
        }

        assert_eq!(
            "x".parse::<MetricType>(),
            Err(ParseMetricError::UnknownType("x".to_owned()))
        );
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(
            "millisecond".parse::<MetricUnit>().unwrap(),
            MetricUnit::Duration(DurationUnit::MilliSecond)
        );
        assert_eq!(
            "kibibyte".parse::<MetricUnit>().unwrap(),
            MetricUnit::Information(InformationUnit::KibiByte)
        );
        assert_eq!("".parse::<MetricUnit>().unwrap(), MetricUnit::None);
        assert_eq!(
            "requests".parse::<MetricUnit>().unwrap(),
            MetricUnit::Custom("requests".to_owned())
        );
        assert!("req/s".parse::<MetricUnit>().is_err());
    }

    #[test]
    fn test_unit_display() {
        assert_eq!(MetricUnit::Duration(DurationUnit::Day).to_string(), "day");
        assert_eq!(MetricUnit::Fraction(FractionUnit::Percent).to_string(), "percent");
        assert_eq!(MetricUnit::None.to_string(), "none");
    }

    #[test]
    fn test_unit_serde() {
        let unit: MetricUnit = serde_json::from_str(r#""second""#).unwrap();
        assert_eq!(unit, MetricUnit::Duration(DurationUnit::Second));
        assert_eq!(serde_json::to_string(&unit).unwrap(), r#""second""#);
    }

    #[test]
    fn test_hash_set_value_is_stable() {
        // FNV-1a 32-bit of the empty input is the offset basis.
        assert_eq!(hash_set_value(""), 0x811c_9dc5);
        assert_eq!(hash_set_value("user-1"), hash_set_value("user-1"));
        assert_ne!(hash_set_value("user-1"), hash_set_value("user-2"));
    }
}
