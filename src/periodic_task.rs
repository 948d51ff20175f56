use crate::{Error, Result};
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod timer;

pub use timer::{ManualTimer, ThreadTimer, Tick, Timer};

/// Raises a cancellation request that all of its [`CancellationToken`]s observe.
#[derive(Debug, Default)]
pub struct CancellationSource {
    cancelled: Arc<AtomicBool>,
}

/// Observes the cancellation request of the [`CancellationSource`] it was obtained from.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSource {
    /// Create a source that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a token observing this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Request cancellation. Cannot be undone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl CancellationToken {
    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// An action that is executed repeatedly by a [`Timer`] until it is cancelled or disposed.
///
/// Cancellation is cooperative: every tick first checks whether cancellation was requested or
/// the task was disposed, and if so, stops the timer instead of executing the action.
/// An execution that is already running is never aborted.
pub struct PeriodicTask {
    action: Arc<dyn Fn() + Send + Sync>,
    timer: Mutex<Box<dyn Timer>>,
    disposed: Arc<AtomicBool>,
}

impl PeriodicTask {
    /// Create a task that executes `action` on the ticks of `timer`. The task is not started.
    pub fn new(action: impl Fn() + Send + Sync + 'static, timer: Box<dyn Timer>) -> Self {
        Self {
            action: Arc::new(action),
            timer: Mutex::new(timer),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start executing the action every `interval`, until `cancellation` is cancelled or this task is disposed.
    ///
    /// Fails if `interval` is zero, or if this task was disposed.
    pub fn start(&self, interval: Duration, cancellation: CancellationToken) -> Result {
        if self.is_disposed() {
            return Err(Error::disposed("PeriodicTask"));
        }
        if interval.is_zero() {
            return Err(Error::invalid_argument(
                "interval",
                "the interval must be greater than zero",
            ));
        }

        let action = Arc::clone(&self.action);
        let disposed = Arc::clone(&self.disposed);
        self.timer.lock().start(
            interval,
            Box::new(move || {
                if cancellation.is_cancelled() || disposed.load(Ordering::Acquire) {
                    return ControlFlow::Break(());
                }
                action();
                ControlFlow::Continue(())
            }),
        )
    }

    /// Stop this task for good. Further calls to [`PeriodicTask::start`] fail.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.timer.lock().stop();
    }

    /// Returns true if this task was disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Debug for PeriodicTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("timer", &self.timer)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.dispose();
    }
}
