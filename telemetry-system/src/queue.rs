use std::time::Duration;

use crate::TimerHandle;

/// A one-shot unit of work executed with exclusive access to the queue's state.
pub type Task<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// A unit of work executed every time a repeating timer fires.
pub type RepeatingTask<S> = Box<dyn FnMut(&mut S) + Send + 'static>;

/// A logically serial execution context owning state of type `S`.
///
/// Tasks never run concurrently with each other. Tasks submitted from the same thread run in
/// submission order. Tasks from different threads run in the order they were enqueued, which is
/// not necessarily the order in which the dispatch calls were made.
pub trait DispatchQueue<S>: Send + Sync {
    /// Enqueues a task and returns immediately.
    fn dispatch_async(&self, task: Task<S>);

    /// Enqueues a task and blocks the calling thread until it has run.
    ///
    /// Calling this from a task running on the same queue deadlocks. Implementations may detect
    /// this in debug builds.
    fn dispatch_sync(&self, task: Task<S>);

    /// Runs a task once after `delay` has elapsed.
    ///
    /// The task does not run if the returned handle is cancelled or dropped before the deadline.
    fn dispatch_after(&self, delay: Duration, task: Task<S>) -> TimerHandle;

    /// Runs a task every `interval` until the returned handle is cancelled or dropped.
    ///
    /// `leeway` allows the queue to fire the timer up to that much earlier to coalesce wake-ups.
    /// It is a hint and not a guarantee.
    fn dispatch_repeating(
        &self,
        interval: Duration,
        leeway: Duration,
        task: RepeatingTask<S>,
    ) -> TimerHandle;
}
