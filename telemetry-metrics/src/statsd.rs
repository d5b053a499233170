//! Serialization of metric buckets into the statsd line protocol.
//!
//! Every metric becomes one line:
//!
//! ```text
//! <key>@<unit>:<value>[:<value>...]|<type>[|#<tag>:<value>[,<tag>:<value>...]]|T<timestamp>
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use telemetry_common::UnixTimestamp;

use crate::Metric;

/// Replaces every character outside `[A-Za-z0-9_/.-]` with an underscore.
struct SanitizedKey<'a>(&'a str);

impl fmt::Display for SanitizedKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if c.is_ascii_alphanumeric() || ['_', '/', '.', '-'].contains(&c) {
                f.write_char(c)?;
            } else {
                f.write_char('_')?;
            }
        }
        Ok(())
    }
}

/// Strips every character that is not a word character, whitespace or one of `:/@.{}[]$-`.
struct SanitizedTagValue<'a>(&'a str);

impl fmt::Display for SanitizedTagValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            if c.is_alphanumeric()
                || c.is_whitespace()
                || ['_', ':', '/', '@', '.', '{', '}', '[', ']', '$', '-'].contains(&c)
            {
                f.write_char(c)?;
            }
        }
        Ok(())
    }
}

fn write_metric(buf: &mut String, timestamp: UnixTimestamp, metric: &Metric) -> fmt::Result {
    write!(buf, "{}@{}", SanitizedKey(&metric.name), metric.unit)?;
    for value in metric.value.iter_values() {
        write!(buf, ":{value}")?;
    }
    write!(buf, "|{}", metric.ty())?;

    for (index, (key, value)) in metric.tags.iter().enumerate() {
        let prefix = if index == 0 { "|#" } else { "," };
        write!(
            buf,
            "{prefix}{}:{}",
            SanitizedKey(key),
            SanitizedTagValue(value)
        )?;
    }

    writeln!(buf, "|T{timestamp}")
}

/// Encodes flushed buckets as statsd lines, ordered by bucket timestamp.
pub fn encode_statsd(buckets: &BTreeMap<UnixTimestamp, Vec<Metric>>) -> String {
    let mut buf = String::new();
    for (timestamp, metrics) in buckets {
        for metric in metrics {
            // Writing into a `String` cannot fail.
            write_metric(&mut buf, *timestamp, metric).ok();
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::{BucketValue, DurationUnit, GaugeValue, MetricUnit};

    fn metric(name: &str, value: BucketValue, tags: &[(&str, &str)]) -> Metric {
        Metric {
            name: name.to_owned(),
            unit: MetricUnit::None,
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            value,
        }
    }

    #[test]
    fn test_encode_lines() {
        let mut timing = metric(
            "app.start",
            BucketValue::Distribution(vec![1.5, 2.0]),
            &[("screen", "main"), ("os", "ios")],
        );
        timing.unit = MetricUnit::Duration(DurationUnit::Second);

        let buckets = BTreeMap::from([
            (
                UnixTimestamp::from_secs(1_700_000_010),
                vec![metric("clicks", BucketValue::Counter(3.0), &[])],
            ),
            (
                UnixTimestamp::from_secs(1_700_000_000),
                vec![
                    timing,
                    metric("memory", BucketValue::Gauge(GaugeValue::single(4.0)), &[]),
                ],
            ),
        ]);

        assert_snapshot!(encode_statsd(&buckets).trim_end(), @r"
        app.start@second:1.5:2|d|#os:ios,screen:main|T1700000000
        memory@none:4:4:4:4:1|g|T1700000000
        clicks@none:3|c|T1700000010
        ");
    }

    #[test]
    fn test_sanitize_key_and_tags() {
        let buckets = BTreeMap::from([(
            UnixTimestamp::from_secs(10),
            vec![metric(
                "my key+ä!",
                BucketValue::Counter(1.0),
                &[("tag key", "a=b {c} $d\\e")],
            )],
        )]);

        assert_snapshot!(encode_statsd(&buckets).trim_end(), @"my_key___@none:1|c|#tag_key:ab {c} $de|T10");
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode_statsd(&BTreeMap::new()), "");
    }
}
