use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::runtime::{self, Runtime};
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{CancellationFlag, DispatchQueue, RepeatingTask, Task, TimerHandle};

/// Shortest period of a repeating timer, since tokio intervals cannot have a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

enum Message<S> {
    Run(Task<S>),
    Fire {
        cancelled: CancellationFlag,
        task: Task<S>,
    },
    Tick {
        cancelled: CancellationFlag,
        task: Arc<Mutex<RepeatingTask<S>>>,
    },
    Shutdown,
}

/// The worker side of a [`SerialQueue`].
struct Worker<S> {
    name: String,
    state: S,
    rx: Receiver<Message<S>>,
}

impl<S> Worker<S> {
    async fn run(mut self) {
        while let Ok(message) = self.rx.recv_async().await {
            match message {
                Message::Run(task) => self.guarded(task),
                Message::Fire { cancelled, task } => {
                    // The deadline may have passed while the handle was being cancelled.
                    if !cancelled.is_cancelled() {
                        self.guarded(task);
                    }
                }
                Message::Tick { cancelled, task } => {
                    if !cancelled.is_cancelled() {
                        let mut task = task.lock();
                        self.guarded(|state| (*task)(state));
                    }
                }
                Message::Shutdown => break,
            }
        }

        telemetry_log::trace!("serial queue {} stopped", self.name);
    }

    fn guarded(&mut self, task: impl FnOnce(&mut S)) {
        let state = &mut self.state;
        if panic::catch_unwind(AssertUnwindSafe(|| task(state))).is_err() {
            telemetry_log::error!("task on serial queue {} panicked", self.name);
        }
    }
}

/// A [`DispatchQueue`] backed by a dedicated worker thread.
///
/// The worker thread drives a current-thread tokio runtime. A single task on that runtime owns
/// the state and runs submitted tasks in FIFO order. Timers are tokio tasks on the same runtime
/// that enqueue their work once due, so timer tasks never run concurrently with regular tasks.
/// Tokio timers have no notion of leeway, so the leeway of repeating timers is ignored.
///
/// Dropping the queue stops the worker after it has run all tasks submitted before the drop.
/// Pending timers are discarded. Tasks that only hold a weak reference to their owner still run,
/// but find the owner gone and do nothing.
pub struct SerialQueue<S> {
    tx: Sender<Message<S>>,
    runtime: runtime::Handle,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl<S> SerialQueue<S>
where
    S: Send + 'static,
{
    /// Spawns the worker thread with the given name and initial state.
    pub fn new(name: impl Into<String>, state: S) -> io::Result<Self> {
        let name = name.into();
        let (tx, rx) = flume::unbounded();

        let worker = Worker {
            name: name.clone(),
            state,
            rx,
        };

        let runtime: Runtime = runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || runtime.block_on(worker.run()))?;

        Ok(Self {
            tx,
            runtime: handle,
            worker_id: thread.thread().id(),
            worker: Some(thread),
        })
    }

    /// Returns `true` if the calling thread is this queue's worker.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    fn send(&self, message: Message<S>) {
        if self.tx.send(message).is_err() {
            telemetry_log::error!("serial queue worker is gone, dropping task");
        }
    }
}

impl<S> DispatchQueue<S> for SerialQueue<S>
where
    S: Send + 'static,
{
    fn dispatch_async(&self, task: Task<S>) {
        self.send(Message::Run(task));
    }

    /// Blocks on a oneshot channel, so this must not be called from within an async runtime.
    fn dispatch_sync(&self, task: Task<S>) {
        debug_assert!(
            !self.is_current(),
            "dispatch_sync called from the queue's own worker"
        );

        let (done_tx, done_rx) = oneshot::channel();
        self.send(Message::Run(Box::new(move |state| {
            task(state);
            done_tx.send(()).ok();
        })));

        // Also returns if the worker dropped the task without running it.
        done_rx.blocking_recv().ok();
    }

    fn dispatch_after(&self, delay: Duration, task: Task<S>) -> TimerHandle {
        let (handle, cancelled) = TimerHandle::new();
        let tx = self.tx.clone();

        let sleeper = self.runtime.spawn(async move {
            time::sleep(delay).await;
            tx.send(Message::Fire { cancelled, task }).ok();
        });

        handle.with_sleeper(sleeper.abort_handle())
    }

    fn dispatch_repeating(
        &self,
        interval: Duration,
        _leeway: Duration,
        task: RepeatingTask<S>,
    ) -> TimerHandle {
        let (handle, cancelled) = TimerHandle::new();
        let tx = self.tx.clone();
        let period = interval.max(MIN_INTERVAL);
        let task = Arc::new(Mutex::new(task));

        let sleeper = self.runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let message = Message::Tick {
                    cancelled: cancelled.clone(),
                    task: Arc::clone(&task),
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
        });

        handle.with_sleeper(sleeper.abort_handle())
    }
}

impl<S> Drop for SerialQueue<S> {
    fn drop(&mut self) {
        self.tx.send(Message::Shutdown).ok();

        let Some(worker) = self.worker.take() else {
            return;
        };

        // The last reference can be released by a task on the worker itself.
        if thread::current().id() != self.worker_id {
            worker.join().ok();
        }
    }
}

impl<S> std::fmt::Debug for SerialQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("worker_id", &self.worker_id)
            .finish()
    }
}
