use std::fmt;
use std::str::FromStr;

use rand::Rng;
use uuid::Uuid;

/// An error returned when parsing a [`TraceId`] or [`SpanId`] fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParseIdError;

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid identifier")
    }
}

impl std::error::Error for ParseIdError {}

/// A 128-bit identifier correlating all telemetry of one trace.
///
/// Formatted as 32 lowercase hex characters without dashes.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Creates a new random trace identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns `true` if this is the all-zero identifier.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId(\"{}\")", self.0.as_simple())
    }
}

impl FromStr for TraceId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self).map_err(|_| ParseIdError)
    }
}

impl From<Uuid> for TraceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl_str_serde!(TraceId, "a trace identifier");

/// A 64-bit identifier of a span within a trace.
///
/// Formatted as 16 lowercase hex characters.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SpanId(u64);

impl SpanId {
    /// Creates a new random span identifier.
    pub fn random() -> Self {
        Self(rand::rng().random_range(1..=u64::MAX))
    }

    /// Creates a span identifier from its numeric value.
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId(\"{self}\")")
    }
}

impl FromStr for SpanId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 {
            return Err(ParseIdError);
        }
        u64::from_str_radix(s, 16).map(Self).map_err(|_| ParseIdError)
    }
}

impl_str_serde!(SpanId, "a span identifier");

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_trace_id_format() {
        let id: TraceId = "67e5504410b1426f9247bb680e5fe0c8".parse().unwrap();
        assert_eq!(id.to_string(), "67e5504410b1426f9247bb680e5fe0c8");
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            r#""67e5504410b1426f9247bb680e5fe0c8""#
        );
        assert!(!id.is_nil());
        assert!(TraceId::default().is_nil());
    }

    #[test]
    fn test_span_id_format() {
        let id = SpanId::from_u64(0xabc);
        assert_eq!(id.to_string(), "0000000000000abc");
        assert_eq!(id, "0000000000000abc".parse::<SpanId>().unwrap());
        assert!("abc".parse::<SpanId>().is_err());
    }

    #[test]
    fn test_deserialize_ids() {
        let id: SpanId = serde_json::from_str(r#""0000000000000abc""#).unwrap();
        assert_eq!(id, SpanId::from_u64(0xabc));

        let error = serde_json::from_str::<TraceId>(r#""not-a-trace""#).unwrap_err();
        assert!(
            error
                .to_string()
                .starts_with(r#"invalid value: string "not-a-trace", expected a trace identifier"#)
        );
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(TraceId::random(), TraceId::random());
        assert_ne!(SpanId::random(), SpanId::random());
    }
}
