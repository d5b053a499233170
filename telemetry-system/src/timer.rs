use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::AbortHandle;

/// Handle to a timer scheduled on a [`DispatchQueue`](crate::DispatchQueue).
///
/// Dropping the handle cancels the timer. A cancelled timer never runs its task again, even if
/// its deadline has already passed and the queue has not yet gotten to it.
#[derive(Debug)]
#[must_use = "dropping a timer handle cancels the timer"]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    sleeper: Option<AbortHandle>,
}

impl TimerHandle {
    /// Creates a handle and the flag the queue observes before firing the timer.
    pub fn new() -> (Self, CancellationFlag) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = CancellationFlag(Arc::clone(&cancelled));
        let handle = Self {
            cancelled,
            sleeper: None,
        };
        (handle, flag)
    }

    /// Attaches the runtime task that waits for the timer's deadline, aborted on cancel.
    pub(crate) fn with_sleeper(mut self, sleeper: AbortHandle) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Cancels the timer.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(ref sleeper) = self.sleeper {
            sleeper.abort();
        }
    }

    /// Returns `true` if the timer has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The queue's side of a [`TimerHandle`].
#[derive(Clone, Debug)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Returns `true` if the corresponding handle was cancelled or dropped.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel() {
        let (handle, flag) = TimerHandle::new();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_drop_cancels() {
        let (handle, flag) = TimerHandle::new();
        drop(handle);
        assert!(flag.is_cancelled());
    }
}
