use std::collections::BTreeMap;
use std::sync::Arc;

use telemetry_common::{Envelope, EnvelopeItem, ItemType, Transport, UnixTimestamp};

use crate::{Metric, encode_statsd};

/// Content type of the statsd envelope item.
pub const STATSD_CONTENT_TYPE: &str = "text/plain";

/// Receives buckets flushed by the [`BucketAggregator`](crate::BucketAggregator).
///
/// Called outside of the aggregator's lock. Delivery is fire and forget.
pub trait MetricsClient: Send + Sync {
    /// Takes ownership of flushed metrics, grouped by bucket timestamp.
    fn capture(&self, buckets: BTreeMap<UnixTimestamp, Vec<Metric>>);
}

/// A [`MetricsClient`] that sends each flush as one `statsd` envelope item.
#[derive(Clone)]
pub struct EnvelopeMetricsClient {
    transport: Arc<dyn Transport>,
}

impl EnvelopeMetricsClient {
    /// Creates a client sending to the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl MetricsClient for EnvelopeMetricsClient {
    fn capture(&self, buckets: BTreeMap<UnixTimestamp, Vec<Metric>>) {
        let payload = encode_statsd(&buckets);
        if payload.is_empty() {
            return;
        }

        telemetry_log::trace!(
            "sending {} metric buckets",
            buckets.values().map(Vec::len).sum::<usize>()
        );

        let mut item = EnvelopeItem::new(ItemType::Statsd);
        item.set_payload(STATSD_CONTENT_TYPE, payload.into_bytes());
        self.transport.send_envelope(Envelope::from_item(item));
    }
}

impl std::fmt::Debug for EnvelopeMetricsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeMetricsClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use telemetry_test::RecordingTransport;

    use super::*;
    use crate::{BucketValue, MetricUnit};

    #[test]
    fn test_sends_statsd_item() {
        telemetry_test::setup();

        let transport = RecordingTransport::new();
        let client = EnvelopeMetricsClient::new(Arc::new(transport.clone()));

        client.capture(BTreeMap::from([(
            UnixTimestamp::from_secs(1_700_000_000),
            vec![Metric {
                name: "clicks".to_owned(),
                unit: MetricUnit::None,
                tags: BTreeMap::from([("release".to_owned(), "1.0".to_owned())]),
                value: BucketValue::Counter(3.0),
            }],
        )]));

        let envelopes = transport.take();
        assert_eq!(envelopes.len(), 1);
        let text = String::from_utf8(envelopes[0].to_vec().unwrap()).unwrap();
        assert_snapshot!(text.trim_end(), @r#"
        {}
        {"type":"statsd","length":41,"content_type":"text/plain"}
        clicks@none:3|c|#release:1.0|T1700000000
        "#);
    }

    #[test]
    fn test_empty_flush_sends_nothing() {
        let transport = RecordingTransport::new();
        let client = EnvelopeMetricsClient::new(Arc::new(transport.clone()));

        client.capture(BTreeMap::new());
        assert!(transport.envelopes().is_empty());
    }
}
