use std::collections::{BTreeMap, BTreeSet};

use crate::protocol::{CounterType, DistributionType, GaugeType, MetricType, MetricUnit, SetType};

/// A snapshot of values within a gauge [`Metric`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaugeValue {
    /// The last value reported in the bucket.
    ///
    /// This aggregation is not commutative.
    pub last: GaugeType,
    /// The minimum value reported in the bucket.
    pub min: GaugeType,
    /// The maximum value reported in the bucket.
    pub max: GaugeType,
    /// The sum of all values reported in the bucket.
    pub sum: GaugeType,
    /// The number of times this bucket was updated with a new value.
    pub count: u64,
}

impl GaugeValue {
    /// Creates a gauge snapshot from a single value.
    pub fn single(value: GaugeType) -> Self {
        Self {
            last: value,
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    /// Inserts a new value into the gauge.
    pub fn insert(&mut self, value: GaugeType) {
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }
}

/// Converts a raw value into a set element.
///
/// Only values in `[0, u64::MAX)` are accepted. Negative numbers, NaN and `u64::MAX` itself are
/// rejected.
fn set_element(value: f64) -> Option<SetType> {
    (0.0..SetType::MAX as f64)
        .contains(&value)
        .then_some(value as SetType)
}

/// The aggregated value of a [`Metric`].
#[derive(Clone, Debug, PartialEq)]
pub enum BucketValue {
    /// Sum of all reported values.
    Counter(CounterType),
    /// Every reported value, in order of arrival.
    Distribution(Vec<DistributionType>),
    /// The unique reported values.
    Set(BTreeSet<SetType>),
    /// Last, min, max, sum and count of reported values.
    Gauge(GaugeValue),
}

impl BucketValue {
    /// Creates a value of the given type from its first data point.
    ///
    /// Returns `None` if the value is not accepted for this type.
    pub fn single(ty: MetricType, value: f64) -> Option<Self> {
        Some(match ty {
            MetricType::Counter => Self::Counter(value),
            MetricType::Distribution => Self::Distribution(vec![value]),
            MetricType::Set => Self::Set(BTreeSet::from([set_element(value)?])),
            MetricType::Gauge => Self::Gauge(GaugeValue::single(value)),
        })
    }

    /// Returns the type of this value.
    pub fn ty(&self) -> MetricType {
        match self {
            Self::Counter(_) => MetricType::Counter,
            Self::Distribution(_) => MetricType::Distribution,
            Self::Set(_) => MetricType::Set,
            Self::Gauge(_) => MetricType::Gauge,
        }
    }

    /// Adds a data point. Out of range set values are ignored.
    pub fn insert(&mut self, value: f64) {
        match self {
            Self::Counter(sum) => *sum += value,
            Self::Distribution(values) => values.push(value),
            Self::Set(set) => {
                if let Some(element) = set_element(value) {
                    set.insert(element);
                }
            }
            Self::Gauge(gauge) => gauge.insert(value),
        }
    }

    /// Returns the cost of this value towards the aggregator's weight limit.
    ///
    /// Counters and gauges weigh `1`, distributions the number of values and sets their
    /// cardinality.
    pub fn weight(&self) -> usize {
        match self {
            Self::Counter(_) => 1,
            Self::Distribution(values) => values.len(),
            Self::Set(set) => set.len(),
            Self::Gauge(_) => 1,
        }
    }

    /// Returns the values written to the statsd line, in order.
    pub fn iter_values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            Self::Counter(sum) => Box::new(std::iter::once(*sum)),
            Self::Distribution(values) => Box::new(values.iter().copied()),
            Self::Set(set) => Box::new(set.iter().map(|v| *v as f64)),
            Self::Gauge(gauge) => Box::new(
                [gauge.last, gauge.min, gauge.max, gauge.sum, gauge.count as f64].into_iter(),
            ),
        }
    }
}

/// An aggregated metric within a single rollup window.
///
/// The name, unit and tags form the identity of a metric together with the type of its value.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    /// The name of the metric, e.g. `app.start`.
    pub name: String,
    /// The unit of all values.
    pub unit: MetricUnit,
    /// Tags sorted by key.
    pub tags: BTreeMap<String, String>,
    /// The aggregated value.
    pub value: BucketValue,
}

impl Metric {
    /// Returns the type of this metric.
    pub fn ty(&self) -> MetricType {
        self.value.ty()
    }

    /// Returns the weight of this metric.
    pub fn weight(&self) -> usize {
        self.value.weight()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_counter_sums() {
        let mut value = BucketValue::single(MetricType::Counter, 1.0).unwrap();
        value.insert(2.5);
        assert_eq!(value, BucketValue::Counter(3.5));
        assert_eq!(value.weight(), 1);
    }

    #[test]
    fn test_gauge_tracks_snapshot() {
        let mut value = BucketValue::single(MetricType::Gauge, 1.0).unwrap();
        value.insert(-1.0);
        assert_eq!(value.weight(), 1);
        assert_eq!(
            value.iter_values().collect::<Vec<_>>(),
            vec![-1.0, -1.0, 1.0, 0.0, 2.0]
        );
    }

    #[test]
    fn test_distribution_weight_is_len() {
        let mut value = BucketValue::single(MetricType::Distribution, 1.0).unwrap();
        value.insert(1.0);
        value.insert(2.0);
        assert_eq!(value.weight(), 3);
        assert_eq!(value.iter_values().collect::<Vec<_>>(), vec![1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_set_weight_is_cardinality() {
        let mut value = BucketValue::single(MetricType::Set, 1.0).unwrap();
        value.insert(1.0);
        value.insert(2.0);
        assert_eq!(value.weight(), 2);
    }

    /// Values outside `[0, u64::MAX)` are dropped without any signal. The upper bound is
    /// exclusive, so the largest unsigned value cannot be recorded.
    #[test]
    fn test_set_range_quirk() {
        assert_eq!(BucketValue::single(MetricType::Set, -1.0), None);
        assert_eq!(BucketValue::single(MetricType::Set, f64::NAN), None);
        assert_eq!(BucketValue::single(MetricType::Set, u64::MAX as f64), None);
        assert!(BucketValue::single(MetricType::Set, 0.0).is_some());

        let mut value = BucketValue::single(MetricType::Set, 7.0).unwrap();
        value.insert(-3.0);
        value.insert(f64::INFINITY);
        assert_eq!(value, BucketValue::Set(BTreeSet::from([7])));
    }
}
