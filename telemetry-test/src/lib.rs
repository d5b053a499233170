//! Helpers for testing the telemetry core.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output is
//!    captured by the test runner. All logs emitted with [`telemetry_log`] will show up for test
//!    failures or when run with `--nocapture`.
//!
//! # Example
//!
//! ```no_run
//! #[test]
//! fn my_test() {
//!     telemetry_test::setup();
//!
//!     telemetry_log::debug!("hello, world!");
//! }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use telemetry_common::{Envelope, Transport};

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from this crate and mutes all other logs.
pub fn setup() {
    telemetry_log::init_test!();
}

/// A [`Transport`] that keeps every envelope it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    envelopes: Arc<Mutex<Vec<Envelope>>>,
}

impl RecordingTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all envelopes sent so far.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.envelopes.lock().clone()
    }

    /// Removes and returns all envelopes sent so far.
    pub fn take(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.envelopes.lock())
    }
}

impl Transport for RecordingTransport {
    fn send_envelope(&self, envelope: Envelope) {
        self.envelopes.lock().push(envelope);
    }
}

/// Records the batches passed to a captured data callback.
///
/// Clones share the same recording, so one clone can be moved into the callback while the test
/// inspects another.
#[derive(Clone, Debug, Default)]
pub struct BatchRecorder {
    batches: Arc<Mutex<Vec<(Bytes, usize)>>>,
}

impl BatchRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a callback that records every batch into this recorder.
    pub fn callback(&self) -> impl Fn(Bytes, usize) + Send + Sync + 'static {
        let batches = Arc::clone(&self.batches);
        move |data, count| batches.lock().push((data, count))
    }

    /// Returns the number of recorded batches.
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    /// Returns `true` if no batch was recorded.
    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }

    /// Returns all recorded batches.
    pub fn batches(&self) -> Vec<(Bytes, usize)> {
        self.batches.lock().clone()
    }

    /// Returns the item counts of all recorded batches.
    pub fn counts(&self) -> Vec<usize> {
        self.batches.lock().iter().map(|(_, count)| *count).collect()
    }

    /// Returns the recorded batch at `index` decoded as UTF-8.
    ///
    /// # Panics
    ///
    /// Panics if there is no such batch or it is not valid UTF-8.
    pub fn text(&self, index: usize) -> String {
        let batches = self.batches.lock();
        String::from_utf8(batches[index].0.to_vec()).unwrap()
    }
}
