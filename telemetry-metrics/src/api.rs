use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use telemetry_common::{Clock, Random};
use telemetry_system::{DispatchQueue, SerialQueue};

use crate::{AggregatorConfig, BucketAggregator, MetricType, MetricUnit, MetricsClient};

/// Tag holding the release of the application.
pub const RELEASE_TAG: &str = "release";

/// Tag holding the environment of the application.
pub const ENVIRONMENT_TAG: &str = "environment";

/// Options of the [`MetricsApi`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsOptions {
    /// Enables metrics aggregation. Defaults to `false`.
    pub enabled: bool,
    /// Parameters of the bucket aggregator.
    pub aggregator: AggregatorConfig,
}

/// Filter invoked with the key and tags of every metric before it is aggregated.
///
/// Returning `false` drops the value.
pub type BeforeEmitMetric = Box<dyn Fn(&str, &BTreeMap<String, String>) -> bool + Send + Sync>;

/// The entry point for recording metrics.
///
/// The API is constructed explicitly and passed to call sites. When metrics are disabled, every
/// operation is a no-op and no aggregator is started.
pub struct MetricsApi<Q = SerialQueue<()>> {
    aggregator: Option<BucketAggregator<Q>>,
    default_tags: BTreeMap<String, String>,
    before_emit_metric: Option<BeforeEmitMetric>,
}

impl MetricsApi {
    /// Creates the API and starts an aggregator if `options.enabled` is set.
    pub fn new(
        options: &MetricsOptions,
        client: Arc<dyn MetricsClient>,
        clock: Arc<dyn Clock>,
        random: &dyn Random,
    ) -> io::Result<Self> {
        if !options.enabled {
            return Ok(Self::disabled());
        }

        let aggregator =
            BucketAggregator::new(options.aggregator.clone(), client, clock, random)?;
        Ok(Self::with_aggregator(aggregator))
    }
}

impl<Q> MetricsApi<Q>
where
    Q: DispatchQueue<()> + 'static,
{
    /// Creates an API that records nothing.
    pub fn disabled() -> Self {
        Self {
            aggregator: None,
            default_tags: BTreeMap::new(),
            before_emit_metric: None,
        }
    }

    /// Creates an enabled API recording into the given aggregator.
    pub fn with_aggregator(aggregator: BucketAggregator<Q>) -> Self {
        Self {
            aggregator: Some(aggregator),
            default_tags: BTreeMap::new(),
            before_emit_metric: None,
        }
    }

    /// Adds the `release` tag to every metric that does not set it.
    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.default_tags.insert(RELEASE_TAG.to_owned(), release.into());
        self
    }

    /// Adds the `environment` tag to every metric that does not set it.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.default_tags
            .insert(ENVIRONMENT_TAG.to_owned(), environment.into());
        self
    }

    /// Sets the filter to drop metrics before aggregation.
    pub fn before_emit_metric<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str, &BTreeMap<String, String>) -> bool + Send + Sync + 'static,
    {
        self.before_emit_metric = Some(Box::new(filter));
        self
    }

    /// Returns `true` if metrics are recorded.
    pub fn is_enabled(&self) -> bool {
        self.aggregator.is_some()
    }

    /// Returns the aggregator, if metrics are enabled.
    pub fn aggregator(&self) -> Option<&BucketAggregator<Q>> {
        self.aggregator.as_ref()
    }

    /// Adds `value` to a counter.
    pub fn increment<'a>(
        &self,
        key: &str,
        value: f64,
        unit: MetricUnit,
        tags: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        self.add(MetricType::Counter, key, value, unit, tags);
    }

    /// Records the current value of a gauge.
    pub fn gauge<'a>(
        &self,
        key: &str,
        value: f64,
        unit: MetricUnit,
        tags: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        self.add(MetricType::Gauge, key, value, unit, tags);
    }

    /// Adds a value to a distribution.
    pub fn distribution<'a>(
        &self,
        key: &str,
        value: f64,
        unit: MetricUnit,
        tags: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        self.add(MetricType::Distribution, key, value, unit, tags);
    }

    /// Adds a value to a set of unique values.
    ///
    /// Values pass through an `f64`, so values above 2^53 are rounded and distinct large values
    /// may end up as one member of the set. Values that round up to 2^64, including `u64::MAX`,
    /// cannot be recorded and are dropped silently.
    pub fn set<'a>(
        &self,
        key: &str,
        value: u64,
        unit: MetricUnit,
        tags: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        self.add(MetricType::Set, key, value as f64, unit, tags);
    }

    /// Adds a string to a set of unique values.
    ///
    /// The string is hashed to 32 bits and only the hash is kept.
    pub fn set_str<'a>(
        &self,
        key: &str,
        value: &str,
        unit: MetricUnit,
        tags: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let hash = crate::hash_set_value(value);
        self.set(key, u64::from(hash), unit, tags);
    }

    /// Runs `f` and records its duration in seconds as a distribution.
    ///
    /// When metrics are disabled, `f` still runs.
    pub fn timing<'a, F, R>(
        &self,
        key: &str,
        tags: impl IntoIterator<Item = (&'a str, &'a str)>,
        f: F,
    ) -> R
    where
        F: FnOnce() -> R,
    {
        let Some(ref aggregator) = self.aggregator else {
            return f();
        };

        let clock = aggregator.clock();
        let start = clock.monotonic();
        let result = f();
        let elapsed = clock.monotonic().saturating_sub(start);

        self.distribution(
            key,
            elapsed.as_secs_f64(),
            MetricUnit::Duration(crate::DurationUnit::Second),
            tags,
        );

        result
    }

    /// Flushes all buckets on the calling thread.
    pub fn flush(&self) {
        if let Some(ref aggregator) = self.aggregator {
            aggregator.flush(true);
        }
    }

    /// Flushes all buckets and shuts the aggregator down.
    pub fn close(self) {
        if let Some(ref aggregator) = self.aggregator {
            aggregator.close();
        }
    }

    fn add<'a>(
        &self,
        ty: MetricType,
        key: &str,
        value: f64,
        unit: MetricUnit,
        tags: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let Some(ref aggregator) = self.aggregator else {
            return;
        };

        let mut tags: BTreeMap<String, String> = tags
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();

        for (name, value) in &self.default_tags {
            tags.entry(name.clone()).or_insert_with(|| value.clone());
        }

        if let Some(ref before_emit_metric) = self.before_emit_metric {
            if !before_emit_metric(key, &tags) {
                telemetry_log::trace!("metric {key} dropped by before_emit_metric");
                return;
            }
        }

        aggregator.add(ty, key, value, unit, tags);
    }
}

impl<Q> std::fmt::Debug for MetricsApi<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsApi")
            .field("aggregator", &self.aggregator)
            .field("default_tags", &self.default_tags)
            .field("before_emit_metric", &self.before_emit_metric.is_some())
            .finish()
    }
}
