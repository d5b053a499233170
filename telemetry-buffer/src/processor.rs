use std::io;
use std::sync::Arc;
use std::time::Duration;

use telemetry_common::{Clock, Transport};

use crate::{
    AppLifecycleEvent, BeforeSendItem, BufferConfig, BufferOptions, ForwardingTriggers, LogItem,
    MetricItem, TelemetryBuffer, TelemetryMetadata, TelemetryScheduler, TelemetryScope,
    TelemetryType,
};

/// Configuration of a [`TelemetryProcessor`].
#[derive(Default)]
pub struct ProcessorConfig {
    /// Thresholds of the log buffer.
    pub logs: BufferOptions,
    /// Thresholds of the trace metric buffer.
    pub trace_metrics: BufferOptions,
    /// Whether user PII from the scope is attached to items.
    pub send_default_pii: bool,
    /// SDK values used during enrichment.
    pub metadata: TelemetryMetadata,
    /// Optional hook to modify or drop logs.
    pub before_send_log: Option<BeforeSendItem<LogItem>>,
    /// Optional hook to modify or drop trace metrics.
    pub before_send_metric: Option<BeforeSendItem<MetricItem>>,
}

/// Sits between the client and the transport and batches logs and trace metrics.
///
/// Each kind of telemetry has its own buffer running on its own serial queue, and its own
/// [`ForwardingTriggers`], since triggers only hold a single callback.
pub struct TelemetryProcessor {
    logs: TelemetryBuffer<LogItem>,
    metrics: TelemetryBuffer<MetricItem>,
    log_triggers: ForwardingTriggers,
    metric_triggers: ForwardingTriggers,
}

impl TelemetryProcessor {
    /// Creates the processor and spawns the worker threads of both buffers.
    pub fn new(
        config: ProcessorConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        let scheduler = TelemetryScheduler::new(transport);

        let log_scheduler = scheduler.clone();
        let log_config = BufferConfig {
            options: config.logs,
            send_default_pii: config.send_default_pii,
            metadata: config.metadata.clone(),
            before_send_item: config.before_send_log,
            captured_data_callback: Box::new(move |data, count| {
                log_scheduler.capture(data, count, TelemetryType::Log)
            }),
        };

        let metric_config = BufferConfig {
            options: config.trace_metrics,
            send_default_pii: config.send_default_pii,
            metadata: config.metadata,
            before_send_item: config.before_send_metric,
            captured_data_callback: Box::new(move |data, count| {
                scheduler.capture(data, count, TelemetryType::Metric)
            }),
        };

        let logs = TelemetryBuffer::new("telemetry-log-buffer", log_config, Arc::clone(&clock))?;
        let metrics = TelemetryBuffer::new("telemetry-metric-buffer", metric_config, clock)?;

        let log_triggers = ForwardingTriggers::new();
        logs.register_triggers(&log_triggers);
        let metric_triggers = ForwardingTriggers::new();
        metrics.register_triggers(&metric_triggers);

        Ok(Self {
            logs,
            metrics,
            log_triggers,
            metric_triggers,
        })
    }

    /// Enriches and buffers a log.
    pub fn add_log(&self, log: LogItem, scope: &dyn TelemetryScope) {
        self.logs.add(log, scope);
    }

    /// Enriches and buffers a trace metric.
    pub fn add_metric(&self, metric: MetricItem, scope: &dyn TelemetryScope) {
        self.metrics.add(metric, scope);
    }

    /// Flushes both buffers synchronously and returns the total time spent.
    pub fn forward_telemetry_data(&self) -> Duration {
        let logs = self.logs.capture();
        let metrics = self.metrics.capture();
        logs + metrics
    }

    /// Delivers an application lifecycle event to the triggers of both buffers.
    pub fn notify(&self, event: AppLifecycleEvent) {
        self.log_triggers.notify(event);
        self.metric_triggers.notify(event);
    }
}

impl std::fmt::Debug for TelemetryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryProcessor")
            .field("logs", &self.logs)
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use telemetry_common::{ItemType, SystemClock};
    use telemetry_test::RecordingTransport;

    use super::*;
    use crate::{LogLevel, MetricItemType, Scope};

    fn processor(config: ProcessorConfig) -> (TelemetryProcessor, RecordingTransport) {
        let transport = RecordingTransport::new();
        let processor = TelemetryProcessor::new(
            config,
            Arc::new(transport.clone()),
            Arc::new(SystemClock::new()),
        )
        .unwrap();
        (processor, transport)
    }

    fn item_types(transport: &RecordingTransport) -> Vec<(ItemType, Option<usize>)> {
        transport
            .take()
            .iter()
            .flat_map(|envelope| {
                envelope
                    .items()
                    .map(|item| (item.ty(), item.item_count()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_forward_telemetry_data() {
        telemetry_test::setup();

        let (processor, transport) = processor(ProcessorConfig::default());
        let scope = Scope::new();

        processor.add_log(LogItem::new(LogLevel::Info, "one"), &scope);
        processor.add_log(LogItem::new(LogLevel::Error, "two"), &scope);
        processor.add_metric(
            MetricItem::new(MetricItemType::Counter, "clicks", 1.0),
            &scope,
        );

        let elapsed = processor.forward_telemetry_data();
        assert!(elapsed < Duration::from_secs(5));
        assert_eq!(
            item_types(&transport),
            vec![(ItemType::Log, Some(2)), (ItemType::TraceMetric, Some(1))]
        );

        // Nothing left to forward.
        processor.forward_telemetry_data();
        assert!(transport.envelopes().is_empty());
    }

    #[test]
    fn test_lifecycle_event_forwards_both_buffers() {
        let (processor, transport) = processor(ProcessorConfig::default());
        let scope = Scope::new();

        processor.add_log(LogItem::new(LogLevel::Info, "one"), &scope);
        processor.add_metric(MetricItem::new(MetricItemType::Gauge, "memory", 2.0), &scope);

        processor.notify(AppLifecycleEvent::DidEnterBackground);
        processor.forward_telemetry_data();
        transport.take();

        processor.add_log(LogItem::new(LogLevel::Info, "two"), &scope);
        processor.notify(AppLifecycleEvent::WillTerminate);
        assert_eq!(item_types(&transport), vec![(ItemType::Log, Some(1))]);
    }

    #[test]
    fn test_before_send_log_filters() {
        let config = ProcessorConfig {
            before_send_log: Some(Box::new(|log: LogItem| {
                (log.level >= LogLevel::Warn).then_some(log)
            })),
            ..ProcessorConfig::default()
        };
        let (processor, transport) = processor(config);
        let scope = Scope::new();

        processor.add_log(LogItem::new(LogLevel::Debug, "noise"), &scope);
        processor.add_log(LogItem::new(LogLevel::Error, "signal"), &scope);
        processor.forward_telemetry_data();

        assert_eq!(item_types(&transport), vec![(ItemType::Log, Some(1))]);
    }
}
