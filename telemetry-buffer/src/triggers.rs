use std::sync::Arc;

use parking_lot::RwLock;

/// Application lifecycle notifications delivered by the host platform.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AppLifecycleEvent {
    /// The application became the active foreground application.
    DidBecomeActive,
    /// The application is about to move out of the foreground.
    WillResignActive,
    /// The application moved to the background.
    DidEnterBackground,
    /// The application is about to enter the foreground.
    WillEnterForeground,
    /// The application is about to terminate.
    WillTerminate,
}

impl AppLifecycleEvent {
    /// Returns `true` if buffered items must be forwarded before the event completes.
    pub fn forwards_items(self) -> bool {
        matches!(self, Self::WillResignActive | Self::WillTerminate)
    }
}

type ForwardItemsCallback = Arc<dyn Fn() + Send + Sync>;

/// Forwards lifecycle events that require buffered items to be sent right away.
///
/// At most one callback is registered at a time. Registering a new callback replaces the previous
/// one, so every buffer needs its own instance.
#[derive(Default)]
pub struct ForwardingTriggers {
    callback: RwLock<Option<ForwardItemsCallback>>,
}

impl ForwardingTriggers {
    /// Creates triggers without a registered callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the callback invoked when items must be forwarded.
    pub fn register_forward_items_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.callback.write() = Some(Arc::new(callback));
    }

    /// Handles a lifecycle event.
    ///
    /// For [`WillResignActive`](AppLifecycleEvent::WillResignActive) and
    /// [`WillTerminate`](AppLifecycleEvent::WillTerminate), this synchronously invokes the
    /// registered callback. Other events are ignored.
    pub fn notify(&self, event: AppLifecycleEvent) {
        if !event.forwards_items() {
            return;
        }

        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            telemetry_log::debug!("forwarding buffered items on {event:?}");
            callback();
        }
    }
}

impl std::fmt::Debug for ForwardingTriggers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardingTriggers")
            .field("registered", &self.callback.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_forwarding_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let triggers = ForwardingTriggers::new();

        let counter = Arc::clone(&calls);
        triggers.register_forward_items_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        triggers.notify(AppLifecycleEvent::DidBecomeActive);
        triggers.notify(AppLifecycleEvent::DidEnterBackground);
        triggers.notify(AppLifecycleEvent::WillEnterForeground);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        triggers.notify(AppLifecycleEvent::WillResignActive);
        triggers.notify(AppLifecycleEvent::WillTerminate);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_register_replaces_callback() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let triggers = ForwardingTriggers::new();

        let counter = Arc::clone(&first);
        triggers.register_forward_items_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        triggers.register_forward_items_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        triggers.notify(AppLifecycleEvent::WillTerminate);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_without_callback() {
        ForwardingTriggers::new().notify(AppLifecycleEvent::WillTerminate);
    }
}
