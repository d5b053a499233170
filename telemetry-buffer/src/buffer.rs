use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use telemetry_common::Clock;
use telemetry_log::LogError;
use telemetry_system::{DispatchQueue, SerialQueue, TimerHandle};

use crate::{
    BatchBuffer, BufferOptions, ForwardingTriggers, TelemetryItem, TelemetryMetadata,
    TelemetryScope, apply_to_item,
};

/// Filter and transform hook invoked before an item is buffered.
///
/// Returning `None` drops the item.
pub type BeforeSendItem<T> = Box<dyn Fn(T) -> Option<T> + Send + Sync>;

/// Receives every flushed batch together with the number of items in it.
pub type CapturedDataCallback = Box<dyn Fn(Bytes, usize) + Send + Sync>;

/// Configuration of a [`TelemetryBuffer`].
pub struct BufferConfig<T> {
    /// Flush thresholds.
    pub options: BufferOptions,
    /// Whether user PII from the scope is attached to items.
    pub send_default_pii: bool,
    /// SDK values used during enrichment.
    pub metadata: TelemetryMetadata,
    /// Optional hook to modify or drop items before buffering.
    pub before_send_item: Option<BeforeSendItem<T>>,
    /// The sink of flushed batches.
    pub captured_data_callback: CapturedDataCallback,
}

impl<T> BufferConfig<T> {
    /// Creates a configuration delivering batches to `callback`.
    pub fn new<F>(options: BufferOptions, callback: F) -> Self
    where
        F: Fn(Bytes, usize) + Send + Sync + 'static,
    {
        Self {
            options,
            send_default_pii: false,
            metadata: TelemetryMetadata::default(),
            before_send_item: None,
            captured_data_callback: Box::new(callback),
        }
    }

    /// Sets whether user PII is attached to items.
    pub fn send_default_pii(mut self, send_default_pii: bool) -> Self {
        self.send_default_pii = send_default_pii;
        self
    }

    /// Sets the SDK metadata used for enrichment.
    pub fn metadata(mut self, metadata: TelemetryMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the hook to modify or drop items.
    pub fn before_send_item<F>(mut self, before_send_item: F) -> Self
    where
        F: Fn(T) -> Option<T> + Send + Sync + 'static,
    {
        self.before_send_item = Some(Box::new(before_send_item));
        self
    }
}

impl<T> std::fmt::Debug for BufferConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferConfig")
            .field("options", &self.options)
            .field("send_default_pii", &self.send_default_pii)
            .field("metadata", &self.metadata)
            .field("before_send_item", &self.before_send_item.is_some())
            .finish_non_exhaustive()
    }
}

/// The state of a [`TelemetryBuffer`] owned by its serial queue.
#[derive(Debug, Default)]
pub struct BufferState {
    store: BatchBuffer,
    timer: Option<TimerHandle>,
}

impl BufferState {
    /// Returns the number of buffered items.
    pub fn items_count(&self) -> usize {
        self.store.items_count()
    }

    /// Returns the total encoded size of buffered items.
    pub fn items_data_size(&self) -> usize {
        self.store.items_data_size()
    }

    /// Returns `true` if a flush timer is armed.
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }
}

struct Inner<T, Q> {
    config: BufferConfig<T>,
    clock: Arc<dyn Clock>,
    queue: Q,
}

impl<T, Q> Inner<T, Q>
where
    T: TelemetryItem,
    Q: DispatchQueue<BufferState> + 'static,
{
    fn encode_and_buffer(self: &Arc<Self>, state: &mut BufferState, item: T) {
        let was_empty = state.store.items_data_size() == 0;

        if let Err(error) = state.store.append(&item) {
            telemetry_log::error!("dropping item: {}", LogError(&error));
            return;
        }

        let options = &self.config.options;
        if state.store.items_count() >= options.max_item_count
            || state.store.items_data_size() >= options.max_buffer_size_bytes
        {
            self.perform_capture(state);
        } else if was_empty && state.timer.is_none() {
            self.start_timer(state);
        }
    }

    fn start_timer(self: &Arc<Self>, state: &mut BufferState) {
        let inner = Arc::downgrade(self);
        let timer = self.queue.dispatch_after(
            self.config.options.flush_timeout,
            Box::new(move |state| {
                telemetry_log::debug!("flush timer fired");
                if let Some(inner) = inner.upgrade() {
                    inner.perform_capture(state);
                }
            }),
        );

        state.timer = Some(timer);
    }

    fn perform_capture(&self, state: &mut BufferState) {
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }

        if state.store.is_empty() {
            telemetry_log::debug!("no items to flush");
            return;
        }

        let count = state.store.items_count();
        let data = state.store.batched_data();
        // Cleared before the callback runs, so a panicking sink cannot leave items behind.
        state.store.clear();

        telemetry_log::trace!("flushing {count} items");
        (self.config.captured_data_callback)(data, count);
    }

    fn capture(self: &Arc<Self>) -> Duration {
        let start = self.clock.monotonic();

        let inner = Arc::clone(self);
        self.queue
            .dispatch_sync(Box::new(move |state| inner.perform_capture(state)));

        self.clock.monotonic().saturating_sub(start)
    }
}

/// Batches telemetry items and hands them to a sink.
///
/// Items are enriched with scope data on the calling thread, then encoded and appended on the
/// buffer's serial queue. The buffer flushes all items as one batch when:
///
///  - the number of items reaches `max_item_count`,
///  - their encoded size reaches `max_buffer_size_bytes`,
///  - `flush_timeout` elapsed since the first item entered the empty buffer, or
///  - [`capture`](Self::capture) is called.
///
/// At most one flush timer is armed at a time. Any flush cancels it.
pub struct TelemetryBuffer<T, Q = SerialQueue<BufferState>> {
    inner: Arc<Inner<T, Q>>,
}

impl<T> TelemetryBuffer<T>
where
    T: TelemetryItem,
{
    /// Creates a buffer running on a new [`SerialQueue`] with the given thread name.
    pub fn new(name: &str, config: BufferConfig<T>, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let queue = SerialQueue::new(name, BufferState::default())?;
        Ok(Self::with_queue(config, clock, queue))
    }
}

impl<T, Q> TelemetryBuffer<T, Q>
where
    T: TelemetryItem,
    Q: DispatchQueue<BufferState> + 'static,
{
    /// Creates a buffer running on the given queue.
    pub fn with_queue(config: BufferConfig<T>, clock: Arc<dyn Clock>, queue: Q) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                queue,
            }),
        }
    }

    /// Registers this buffer's [`capture`](Self::capture) with the triggers.
    ///
    /// The triggers do not keep the buffer alive.
    pub fn register_triggers(&self, triggers: &ForwardingTriggers) {
        let inner: Weak<Inner<T, Q>> = Arc::downgrade(&self.inner);
        triggers.register_forward_items_callback(move || {
            if let Some(inner) = inner.upgrade() {
                inner.capture();
            }
        });
    }

    /// Returns the queue owning the buffer state.
    pub fn queue(&self) -> &Q {
        &self.inner.queue
    }

    /// Enriches the item with the scope and enqueues it for buffering.
    ///
    /// The `before_send_item` hook runs synchronously on the calling thread. If it returns
    /// `None`, the item is dropped. Encoding failures are logged and drop the item.
    ///
    /// The queued work only holds a weak reference to the buffer. Items that are still queued
    /// when the buffer is dropped are discarded without reaching the sink, so call
    /// [`capture`](Self::capture) before dropping the buffer to deliver them.
    pub fn add(&self, mut item: T, scope: &dyn TelemetryScope) {
        let config = &self.inner.config;
        apply_to_item(&mut item, scope, &config.metadata, config.send_default_pii);

        if let Some(ref before_send_item) = config.before_send_item {
            match before_send_item(item) {
                Some(processed) => item = processed,
                None => return,
            }
        }

        let inner = Arc::downgrade(&self.inner);
        self.inner.queue.dispatch_async(Box::new(move |state| {
            if let Some(inner) = inner.upgrade() {
                inner.encode_and_buffer(state, item);
            }
        }));
    }

    /// Flushes all buffered items and returns the time spent.
    ///
    /// This blocks until the buffer's queue has processed all previously added items and the
    /// flush. It must not be called from the captured data callback or from any other task on
    /// the buffer's queue, which deadlocks.
    pub fn capture(&self) -> Duration {
        self.inner.capture()
    }
}

impl<T, Q> std::fmt::Debug for TelemetryBuffer<T, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBuffer")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
