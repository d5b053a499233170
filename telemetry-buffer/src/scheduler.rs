use std::sync::Arc;

use bytes::Bytes;
use telemetry_common::{Envelope, EnvelopeItem, ItemType, Transport};

/// The kind of telemetry carried by a batch.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TelemetryType {
    /// Structured logs.
    Log,
    /// Trace-connected metrics.
    Metric,
}

impl TelemetryType {
    /// Returns the envelope item type for batches of this telemetry.
    pub fn item_type(self) -> ItemType {
        match self {
            Self::Log => ItemType::Log,
            Self::Metric => ItemType::TraceMetric,
        }
    }

    /// Returns the content type of batches of this telemetry.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Log => "application/vnd.sentry.items.log+json",
            Self::Metric => "application/vnd.sentry.items.trace-metric+json",
        }
    }
}

/// Wraps flushed batches into envelopes and sends them through the transport.
#[derive(Clone)]
pub struct TelemetryScheduler {
    transport: Arc<dyn Transport>,
}

impl TelemetryScheduler {
    /// Creates a scheduler sending to `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sends a batch of `count` items of the given type.
    pub fn capture(&self, data: Bytes, count: usize, ty: TelemetryType) {
        let mut item = EnvelopeItem::new(ty.item_type());
        item.set_payload(ty.content_type(), data);
        item.set_item_count(count);

        self.transport.send_envelope(Envelope::from_item(item));
    }
}

impl std::fmt::Debug for TelemetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryScheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use telemetry_test::RecordingTransport;

    use super::*;

    #[test]
    fn test_capture_log_batch() {
        let transport = RecordingTransport::new();
        let scheduler = TelemetryScheduler::new(Arc::new(transport.clone()));

        scheduler.capture(
            Bytes::from_static(br#"{"items":[{"body":"hello"}]}"#),
            1,
            TelemetryType::Log,
        );

        let envelopes = transport.take();
        assert_eq!(envelopes.len(), 1);
        let serialized = String::from_utf8(envelopes[0].to_vec().unwrap()).unwrap();
        assert_snapshot!(serialized.trim_end(), @r#"
        {}
        {"type":"log","length":28,"content_type":"application/vnd.sentry.items.log+json","item_count":1}
        {"items":[{"body":"hello"}]}
        "#);
    }

    #[test]
    fn test_capture_metric_batch() {
        let transport = RecordingTransport::new();
        let scheduler = TelemetryScheduler::new(Arc::new(transport.clone()));

        scheduler.capture(Bytes::from_static(b"{\"items\":[]}"), 0, TelemetryType::Metric);

        let envelopes = transport.take();
        let item = envelopes[0].items().next().unwrap();
        assert_eq!(item.ty(), ItemType::TraceMetric);
        assert_eq!(
            item.content_type(),
            Some("application/vnd.sentry.items.trace-metric+json")
        );
        assert_eq!(item.item_count(), Some(0));
    }
}
