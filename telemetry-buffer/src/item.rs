//! Telemetry items collected by the buffer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use telemetry_common::{SpanId, TraceId};

use crate::{AttributeValue, Attributes};

/// A record that can be enriched, encoded and batched by a
/// [`TelemetryBuffer`](crate::TelemetryBuffer).
pub trait TelemetryItem: Serialize + Send + 'static {
    /// Returns the attributes of this item.
    fn attributes(&self) -> &Attributes;

    /// Returns the attributes of this item for modification.
    fn attributes_mut(&mut self) -> &mut Attributes;

    /// Sets the trace this item belongs to.
    fn set_trace_id(&mut self, trace_id: TraceId);

    /// Sets an attribute, replacing any previous value under the same key.
    fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>)
    where
        Self: Sized,
    {
        self.attributes_mut().insert(key.into(), value.into());
    }
}

/// Returns the timestamp as fractional seconds since the UNIX epoch.
fn timestamp_secs(timestamp: &DateTime<Utc>) -> f64 {
    timestamp.timestamp_micros() as f64 / 1_000_000.0
}

/// Severity of a [`LogItem`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Fine-grained diagnostic output.
    Trace,
    /// Debugging output.
    Debug,
    /// Informational messages.
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Errors the application can recover from.
    Error,
    /// Errors that terminate the application.
    Fatal,
}

impl LogLevel {
    /// Returns the OpenTelemetry severity number of this level.
    pub fn severity_number(self) -> u8 {
        match self {
            Self::Trace => 1,
            Self::Debug => 5,
            Self::Info => 9,
            Self::Warn => 13,
            Self::Error => 17,
            Self::Fatal => 21,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// A structured log entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LogItem {
    /// Time at which the log was recorded.
    pub timestamp: DateTime<Utc>,
    /// The trace this log belongs to, set during scope enrichment.
    pub trace_id: TraceId,
    /// The span that was active when the log was recorded.
    pub span_id: Option<SpanId>,
    /// The severity of the log.
    pub level: LogLevel,
    /// The formatted log message.
    pub body: String,
    /// Arbitrary structured attributes.
    pub attributes: Attributes,
}

impl LogItem {
    /// Creates a log recorded now.
    pub fn new(level: LogLevel, body: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            trace_id: TraceId::default(),
            span_id: None,
            level,
            body: body.into(),
            attributes: Attributes::new(),
        }
    }

    /// Returns the severity number derived from the level.
    pub fn severity_number(&self) -> u8 {
        self.level.severity_number()
    }
}

impl TelemetryItem for LogItem {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn set_trace_id(&mut self, trace_id: TraceId) {
        self.trace_id = trace_id;
    }
}

#[derive(Serialize)]
struct LogItemRepr<'a> {
    timestamp: f64,
    trace_id: &'a TraceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    span_id: Option<&'a SpanId>,
    level: LogLevel,
    severity_number: u8,
    body: &'a str,
    attributes: &'a Attributes,
}

impl Serialize for LogItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        LogItemRepr {
            timestamp: timestamp_secs(&self.timestamp),
            trace_id: &self.trace_id,
            span_id: self.span_id.as_ref(),
            level: self.level,
            severity_number: self.severity_number(),
            body: &self.body,
            attributes: &self.attributes,
        }
        .serialize(serializer)
    }
}

/// The kind of a [`MetricItem`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricItemType {
    /// A value added to a running sum.
    Counter,
    /// A point-in-time value.
    Gauge,
    /// A sample of a distribution.
    Distribution,
}

/// A single trace-connected metric measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricItem {
    /// Time at which the value was recorded.
    pub timestamp: DateTime<Utc>,
    /// The trace this metric belongs to, set during scope enrichment.
    pub trace_id: TraceId,
    /// The span that was active when the value was recorded.
    pub span_id: Option<SpanId>,
    /// The name of the metric, e.g. `api.response_time`.
    pub name: String,
    /// The measured value.
    pub value: f64,
    /// The kind of metric.
    pub ty: MetricItemType,
    /// The unit of the value, if any.
    pub unit: Option<String>,
    /// Arbitrary structured attributes.
    pub attributes: Attributes,
}

impl MetricItem {
    /// Creates a metric recorded now.
    pub fn new(ty: MetricItemType, name: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            trace_id: TraceId::default(),
            span_id: None,
            name: name.into(),
            value,
            ty,
            unit: None,
            attributes: Attributes::new(),
        }
    }
}

impl TelemetryItem for MetricItem {
    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn set_trace_id(&mut self, trace_id: TraceId) {
        self.trace_id = trace_id;
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum MetricValueRepr {
    Integer(i64),
    Double(f64),
}

impl MetricValueRepr {
    fn new(ty: MetricItemType, value: f64) -> Self {
        // Counters that carry whole numbers are sent as integers.
        let integer = value as i64;
        if ty == MetricItemType::Counter && (value - integer as f64).abs() < 0.0001 {
            Self::Integer(integer)
        } else {
            Self::Double(value)
        }
    }
}

#[derive(Serialize)]
struct MetricItemRepr<'a> {
    timestamp: f64,
    trace_id: &'a TraceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    span_id: Option<&'a SpanId>,
    name: &'a str,
    value: MetricValueRepr,
    #[serde(rename = "type")]
    ty: MetricItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
    attributes: &'a Attributes,
}

impl Serialize for MetricItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MetricItemRepr {
            timestamp: timestamp_secs(&self.timestamp),
            trace_id: &self.trace_id,
            span_id: self.span_id.as_ref(),
            name: &self.name,
            value: MetricValueRepr::new(self.ty, self.value),
            ty: self.ty,
            unit: self.unit.as_deref(),
            attributes: &self.attributes,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use insta::assert_snapshot;

    use super::*;

    fn timestamp() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap()
    }

    fn trace_id() -> TraceId {
        "67e5504410b1426f9247bb680e5fe0c8".parse().unwrap()
    }

    #[test]
    fn test_serialize_log() {
        let mut log = LogItem::new(LogLevel::Warn, "disk almost full");
        log.timestamp = timestamp();
        log.trace_id = trace_id();
        log.span_id = Some(SpanId::from_u64(0xabc));
        log.set_attribute("free_bytes", 1024);

        assert_snapshot!(serde_json::to_string(&log).unwrap(), @r#"{"timestamp":1700000000.25,"trace_id":"67e5504410b1426f9247bb680e5fe0c8","span_id":"0000000000000abc","level":"warn","severity_number":13,"body":"disk almost full","attributes":{"free_bytes":{"type":"integer","value":1024}}}"#);
    }

    #[test]
    fn test_serialize_counter_as_integer() {
        let mut metric = MetricItem::new(MetricItemType::Counter, "clicks", 3.0);
        metric.timestamp = timestamp();
        metric.trace_id = trace_id();

        assert_snapshot!(serde_json::to_string(&metric).unwrap(), @r#"{"timestamp":1700000000.25,"trace_id":"67e5504410b1426f9247bb680e5fe0c8","name":"clicks","value":3,"type":"counter","attributes":{}}"#);
    }

    #[test]
    fn test_serialize_gauge_as_double() {
        let mut metric = MetricItem::new(MetricItemType::Gauge, "memory", 3.0);
        metric.timestamp = timestamp();
        metric.trace_id = trace_id();
        metric.unit = Some("byte".to_owned());

        assert_snapshot!(serde_json::to_string(&metric).unwrap(), @r#"{"timestamp":1700000000.25,"trace_id":"67e5504410b1426f9247bb680e5fe0c8","name":"memory","value":3.0,"type":"gauge","unit":"byte","attributes":{}}"#);
    }

    #[test]
    fn test_fractional_counter_stays_double() {
        let metric = MetricItem::new(MetricItemType::Counter, "ratio", 2.5);
        let value = serde_json::to_value(&metric).unwrap();
        assert_eq!(value["value"], serde_json::json!(2.5));
    }

    #[test]
    fn test_severity_numbers() {
        assert_eq!(LogLevel::Trace.severity_number(), 1);
        assert_eq!(LogLevel::Info.severity_number(), 9);
        assert_eq!(LogLevel::Fatal.severity_number(), 21);
    }
}
