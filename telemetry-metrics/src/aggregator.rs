use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use telemetry_common::{Clock, Random, UnixTimestamp};
use telemetry_system::{DispatchQueue, SerialQueue, TimerHandle};

use crate::{BucketValue, Metric, MetricType, MetricUnit, MetricsClient};

/// The length of a rollup window in seconds.
///
/// All values of a metric observed within the same window are aggregated into one bucket.
pub const ROLLUP_IN_SECONDS: u64 = 10;

/// The shortest accepted interval of the periodic flush.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Parameters used by the [`BucketAggregator`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// The weight at which all buckets are flushed regardless of their age.
    ///
    /// The current weight is the number of bucket timestamps plus the weight of every metric.
    /// Defaults to `1000`.
    pub total_max_weight: usize,

    /// The interval of the periodic flush of expired buckets.
    ///
    /// Intervals shorter than 100 milliseconds, including zero, are raised to 100 milliseconds.
    /// Defaults to 10 seconds.
    #[serde(with = "telemetry_common::duration_secs")]
    pub flush_interval: Duration,

    /// How much earlier the periodic flush may fire to coalesce wake-ups.
    ///
    /// This is a hint for the queue, which may ignore it.
    /// Defaults to 500 milliseconds.
    #[serde(with = "telemetry_common::duration_secs")]
    pub flush_tolerance: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            total_max_weight: 1_000,
            flush_interval: Duration::from_secs(10),
            flush_tolerance: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct BucketKey {
    ty: MetricType,
    name: String,
    unit: MetricUnit,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Buckets {
    buckets: BTreeMap<UnixTimestamp, HashMap<BucketKey, BucketValue>>,
    total_weight: usize,
}

impl Buckets {
    /// Adds a value and returns the new weight, counting every bucket timestamp as `1`.
    fn insert(&mut self, timestamp: UnixTimestamp, key: BucketKey, value: f64) -> usize {
        let bucket = self.buckets.entry(timestamp).or_default();

        match bucket.get_mut(&key) {
            Some(existing) => {
                let old_weight = existing.weight();
                existing.insert(value);
                self.total_weight += existing.weight() - old_weight;
            }
            None => match BucketValue::single(key.ty, value) {
                Some(created) => {
                    self.total_weight += created.weight();
                    bucket.insert(key, created);
                }
                None => {
                    if bucket.is_empty() {
                        self.buckets.remove(&timestamp);
                    }
                }
            },
        }

        self.buckets.len() + self.total_weight
    }

    /// Removes buckets with a timestamp of at most `cutoff`, or all buckets if `None`.
    fn take(&mut self, cutoff: Option<UnixTimestamp>) -> BTreeMap<UnixTimestamp, Vec<Metric>> {
        let taken = match cutoff {
            None => {
                self.total_weight = 0;
                std::mem::take(&mut self.buckets)
            }
            Some(cutoff) => {
                let keep = match cutoff.as_secs().checked_add(1) {
                    Some(next) => self.buckets.split_off(&UnixTimestamp::from_secs(next)),
                    None => BTreeMap::new(),
                };
                let taken = std::mem::replace(&mut self.buckets, keep);

                let removed = taken
                    .values()
                    .flat_map(|bucket| bucket.values())
                    .map(BucketValue::weight)
                    .sum::<usize>();
                self.total_weight = self.total_weight.saturating_sub(removed);
                taken
            }
        };

        taken
            .into_iter()
            .map(|(timestamp, bucket)| {
                let metrics = bucket
                    .into_iter()
                    .map(|(key, value)| Metric {
                        name: key.name,
                        unit: key.unit,
                        tags: key.tags,
                        value,
                    })
                    .collect();
                (timestamp, metrics)
            })
            .collect()
    }
}

struct Inner<Q> {
    config: AggregatorConfig,
    client: Arc<dyn MetricsClient>,
    clock: Arc<dyn Clock>,
    flush_shift: f64,
    buckets: Mutex<Buckets>,
    queue: Q,
}

impl<Q> Inner<Q>
where
    Q: DispatchQueue<()> + 'static,
{
    fn bucket_timestamp(&self) -> UnixTimestamp {
        UnixTimestamp::from_system(self.clock.now()).floor_to(ROLLUP_IN_SECONDS)
    }

    fn add(
        self: &Arc<Self>,
        ty: MetricType,
        name: &str,
        value: f64,
        unit: MetricUnit,
        tags: BTreeMap<String, String>,
    ) {
        let timestamp = self.bucket_timestamp();
        let key = BucketKey {
            ty,
            name: name.to_owned(),
            unit,
            tags,
        };

        let weight = self.buckets.lock().insert(timestamp, key, value);

        if weight >= self.config.total_max_weight {
            telemetry_log::debug!("metrics aggregator overweight ({weight}), flushing");
            let inner: Weak<Self> = Arc::downgrade(self);
            self.queue.dispatch_async(Box::new(move |_| {
                if let Some(inner) = inner.upgrade() {
                    inner.flush(true);
                }
            }));
        }
    }

    fn flush(&self, force: bool) {
        let cutoff = if force {
            None
        } else {
            let now = self.clock.unix_secs_f64();
            let secs = now - ROLLUP_IN_SECONDS as f64 - self.flush_shift;
            // Negative values saturate to zero.
            Some(UnixTimestamp::from_secs(secs as u64))
        };

        let flushable = self.buckets.lock().take(cutoff);

        if flushable.is_empty() {
            telemetry_log::trace!("no metric buckets to flush");
            return;
        }

        telemetry_log::debug!("flushing {} metric buckets", flushable.len());
        self.client.capture(flushable);
    }
}

/// Aggregates metric values into buckets of [`ROLLUP_IN_SECONDS`] and flushes them to a
/// [`MetricsClient`].
///
/// Values with the same type, name, unit and tags observed in the same rollup window are merged
/// into one [`Metric`]. Tags are sorted by key, so their insertion order does not matter.
///
/// Buckets are flushed:
///
///  - periodically every `flush_interval`, once they are older than one rollup window plus a
///    random shift fixed per aggregator,
///  - all at once on the queue when the total weight reaches `total_max_weight`,
///  - all at once on the calling thread through [`flush(true)`](Self::flush) or
///    [`close`](Self::close).
///
/// `add` only holds a short lock around the bucket map and can be called from any thread. The
/// client is always called without the lock held.
pub struct BucketAggregator<Q = SerialQueue<()>> {
    inner: Arc<Inner<Q>>,
    timer: Mutex<Option<TimerHandle>>,
}

impl BucketAggregator {
    /// Creates an aggregator that runs its timer on a new [`SerialQueue`].
    pub fn new(
        config: AggregatorConfig,
        client: Arc<dyn MetricsClient>,
        clock: Arc<dyn Clock>,
        random: &dyn Random,
    ) -> io::Result<Self> {
        let queue = SerialQueue::new("metrics-aggregator", ())?;
        Ok(Self::with_queue(config, client, clock, random, queue))
    }
}

impl<Q> BucketAggregator<Q>
where
    Q: DispatchQueue<()> + 'static,
{
    /// Creates an aggregator on the given queue and starts the periodic flush.
    pub fn with_queue(
        mut config: AggregatorConfig,
        client: Arc<dyn MetricsClient>,
        clock: Arc<dyn Clock>,
        random: &dyn Random,
        queue: Q,
    ) -> Self {
        // Shifts flushing by up to one rollup window so that a fleet of clients does not flush
        // at the same moment.
        let flush_shift = random.next_number() * ROLLUP_IN_SECONDS as f64;

        if config.flush_interval < MIN_FLUSH_INTERVAL {
            telemetry_log::warn!(
                "metrics flush interval of {:?} is too short, using {:?}",
                config.flush_interval,
                MIN_FLUSH_INTERVAL
            );
            config.flush_interval = MIN_FLUSH_INTERVAL;
        }

        let inner = Arc::new(Inner {
            config,
            client,
            clock,
            flush_shift,
            buckets: Mutex::new(Buckets::default()),
            queue,
        });

        let weak = Arc::downgrade(&inner);
        let timer = inner.queue.dispatch_repeating(
            inner.config.flush_interval,
            inner.config.flush_tolerance,
            Box::new(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.flush(false);
                }
            }),
        );

        Self {
            inner,
            timer: Mutex::new(Some(timer)),
        }
    }

    /// Adds a value to the metric identified by type, name, unit and tags.
    ///
    /// Set values outside of `[0, u64::MAX)` are ignored.
    pub fn add(
        &self,
        ty: MetricType,
        name: &str,
        value: f64,
        unit: MetricUnit,
        tags: BTreeMap<String, String>,
    ) {
        self.inner.add(ty, name, value, unit, tags);
    }

    /// Flushes buckets on the calling thread.
    ///
    /// With `force`, all buckets are flushed. Otherwise only buckets that ended more than one
    /// rollup window plus the flush shift ago.
    pub fn flush(&self, force: bool) {
        self.inner.flush(force);
    }

    /// Flushes all buckets and stops the periodic flush for good.
    pub fn close(&self) {
        self.inner.flush(true);

        if let Some(timer) = self.timer.lock().take() {
            timer.cancel();
        }
    }

    /// Returns the sum of the weights of all buffered metrics.
    pub fn total_weight(&self) -> usize {
        self.inner.buckets.lock().total_weight
    }

    /// Returns the number of buffered bucket timestamps.
    pub fn bucket_count(&self) -> usize {
        self.inner.buckets.lock().buckets.len()
    }

    /// Returns the clock used to assign bucket timestamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Returns the queue running the flush timer.
    pub fn queue(&self) -> &Q {
        &self.inner.queue
    }
}

impl<Q> std::fmt::Debug for BucketAggregator<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketAggregator")
            .field("config", &self.inner.config)
            .field("flush_shift", &self.inner.flush_shift)
            .finish_non_exhaustive()
    }
}
