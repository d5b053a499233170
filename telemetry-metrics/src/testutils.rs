use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use telemetry_common::UnixTimestamp;

use crate::{Metric, MetricsClient};

type Flush = BTreeMap<UnixTimestamp, Vec<Metric>>;

/// A [`MetricsClient`] that keeps every flush and the thread it happened on.
///
/// Clones share the same recording.
#[derive(Clone, Debug, Default)]
pub struct RecordingClient {
    flushes: Arc<Mutex<Vec<(Flush, Option<String>)>>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flushes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flushes.lock().is_empty()
    }

    /// Removes and returns all flushes so far.
    pub fn take(&self) -> Vec<Flush> {
        std::mem::take(&mut *self.flushes.lock())
            .into_iter()
            .map(|(flush, _)| flush)
            .collect()
    }

    /// Returns the names of the threads that flushed.
    pub fn threads(&self) -> Vec<Option<String>> {
        self.flushes
            .lock()
            .iter()
            .map(|(_, thread)| thread.clone())
            .collect()
    }
}

impl MetricsClient for RecordingClient {
    fn capture(&self, buckets: Flush) {
        let thread = thread::current().name().map(str::to_owned);
        self.flushes.lock().push((buckets, thread));
    }
}
