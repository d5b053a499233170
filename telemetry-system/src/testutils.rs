use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{CancellationFlag, DispatchQueue, RepeatingTask, Task, TimerHandle};

enum PendingTask<S> {
    Once(Task<S>),
    Repeating(RepeatingTask<S>),
}

struct PendingTimer<S> {
    delay: Duration,
    cancelled: CancellationFlag,
    task: PendingTask<S>,
}

/// A deterministic [`DispatchQueue`] for tests.
///
/// Tasks submitted through [`dispatch_async`](DispatchQueue::dispatch_async) and
/// [`dispatch_sync`](DispatchQueue::dispatch_sync) run inline on the calling thread. Tasks
/// submitted while another task is running are queued and run right after it, preserving serial
/// execution. Timers never fire on their own; call [`fire_timers`](Self::fire_timers) to run
/// them.
pub struct TestDispatchQueue<S> {
    state: Mutex<S>,
    pending: Mutex<VecDeque<Task<S>>>,
    timers: Mutex<Vec<PendingTimer<S>>>,
}

impl<S> TestDispatchQueue<S> {
    /// Creates a queue owning the given state.
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            pending: Mutex::new(VecDeque::new()),
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Inspects the queue's state.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&*self.state.lock())
    }

    /// Returns the number of timers that have not been cancelled yet.
    pub fn active_timers(&self) -> usize {
        self.timers
            .lock()
            .iter()
            .filter(|timer| !timer.cancelled.is_cancelled())
            .count()
    }

    /// Returns the delays of all active timers in scheduling order.
    pub fn timer_delays(&self) -> Vec<Duration> {
        self.timers
            .lock()
            .iter()
            .filter(|timer| !timer.cancelled.is_cancelled())
            .map(|timer| timer.delay)
            .collect()
    }

    /// Fires every timer scheduled so far and returns how many ran.
    ///
    /// One-shot timers are removed after they run. Repeating timers stay registered until their
    /// handle is cancelled. Cancelled timers are removed without running. Timers scheduled by the
    /// fired tasks run on the next call.
    pub fn fire_timers(&self) -> usize {
        let scheduled = std::mem::take(&mut *self.timers.lock());
        let mut keep = Vec::new();
        let mut fired = 0;

        for timer in scheduled {
            if timer.cancelled.is_cancelled() {
                continue;
            }

            fired += 1;
            match timer.task {
                PendingTask::Once(task) => self.run(task),
                PendingTask::Repeating(mut task) => {
                    self.run(|state| task(state));
                    keep.push(PendingTimer {
                        delay: timer.delay,
                        cancelled: timer.cancelled,
                        task: PendingTask::Repeating(task),
                    });
                }
            }
        }

        let mut timers = self.timers.lock();
        keep.append(&mut timers);
        *timers = keep;

        fired
    }

    fn run(&self, task: impl FnOnce(&mut S)) {
        match self.state.try_lock() {
            Some(mut state) => {
                task(&mut *state);
                self.drain(&mut *state);
            }
            None => panic!("timer fired from within a task of the same queue"),
        }
    }

    fn drain(&self, state: &mut S) {
        loop {
            let next = self.pending.lock().pop_front();
            let Some(task) = next else { break };
            task(state);
        }
    }

    fn schedule(&self, delay: Duration, task: PendingTask<S>) -> TimerHandle {
        let (handle, cancelled) = TimerHandle::new();
        self.timers.lock().push(PendingTimer {
            delay,
            cancelled,
            task,
        });
        handle
    }
}

impl<S> DispatchQueue<S> for TestDispatchQueue<S>
where
    S: Send,
{
    fn dispatch_async(&self, task: Task<S>) {
        match self.state.try_lock() {
            Some(mut state) => {
                task(&mut *state);
                self.drain(&mut *state);
            }
            // A task is currently running and drains the queue when it is done.
            None => self.pending.lock().push_back(task),
        }
    }

    fn dispatch_sync(&self, task: Task<S>) {
        let mut state = self.state.lock();
        task(&mut *state);
        self.drain(&mut *state);
    }

    fn dispatch_after(&self, delay: Duration, task: Task<S>) -> TimerHandle {
        self.schedule(delay, PendingTask::Once(task))
    }

    fn dispatch_repeating(
        &self,
        interval: Duration,
        _leeway: Duration,
        task: RepeatingTask<S>,
    ) -> TimerHandle {
        self.schedule(interval, PendingTask::Repeating(task))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_async_runs_inline() {
        let queue = TestDispatchQueue::new(0);
        queue.dispatch_async(Box::new(|count| *count += 1));
        assert_eq!(queue.with_state(|count| *count), 1);
    }

    #[test]
    fn test_nested_dispatch_runs_after_current_task() {
        let queue: Arc<TestDispatchQueue<Vec<&'static str>>> =
            Arc::new(TestDispatchQueue::new(Vec::new()));

        let inner = Arc::clone(&queue);
        queue.dispatch_async(Box::new(move |items| {
            items.push("outer start");
            inner.dispatch_async(Box::new(|items| items.push("nested")));
            items.push("outer end");
        }));

        assert_eq!(
            queue.with_state(|items| items.clone()),
            vec!["outer start", "outer end", "nested"]
        );
    }

    #[test]
    fn test_timers_fire_on_demand() {
        let queue = TestDispatchQueue::new(0);

        let once = queue.dispatch_after(Duration::from_secs(5), Box::new(|count| *count += 1));
        let repeating = queue.dispatch_repeating(
            Duration::from_secs(10),
            Duration::from_millis(500),
            Box::new(|count| *count += 10),
        );
        assert_eq!(
            queue.timer_delays(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );

        assert_eq!(queue.fire_timers(), 2);
        assert_eq!(queue.with_state(|count| *count), 11);

        // Only the repeating timer remains.
        assert_eq!(queue.fire_timers(), 1);
        assert_eq!(queue.with_state(|count| *count), 21);

        repeating.cancel();
        assert_eq!(queue.fire_timers(), 0);
        drop(once);
    }

    #[test]
    fn test_cancelled_timer_does_not_fire() {
        let queue = TestDispatchQueue::new(0);
        let timer = queue.dispatch_after(Duration::from_secs(1), Box::new(|count| *count += 1));
        drop(timer);

        assert_eq!(queue.active_timers(), 0);
        assert_eq!(queue.fire_timers(), 0);
        assert_eq!(queue.with_state(|count| *count), 0);
    }
}
