use crate::{CancellationSource, PeriodicTask, Result, SessionCache, Timer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Periodically removes expired entries from a [`SessionCache`].
///
/// Lookups already evict the expired entries they stumble upon, but sessions that are never
/// requested again would stay in memory forever without this cleaner.
#[derive(Debug)]
pub struct PeriodicCacheCleaner {
    task: PeriodicTask,
    trim_interval: Duration,
    cancellation: Mutex<Option<CancellationSource>>,
}

impl PeriodicCacheCleaner {
    /// Create a cleaner that trims `cache` every `trim_interval` on the ticks of `timer`.
    /// The cleaner is not started.
    pub fn new(cache: Arc<dyn SessionCache>, trim_interval: Duration, timer: Box<dyn Timer>) -> Self {
        let task = PeriodicTask::new(
            move || {
                if let Err(error) = cache.trim() {
                    log::warn!("Failed to trim the session cache: {error}");
                }
            },
            timer,
        );

        Self {
            task,
            trim_interval,
            cancellation: Mutex::new(None),
        }
    }

    /// Start trimming periodically.
    ///
    /// A trim interval of zero disables periodic trimming, in which case this does nothing.
    pub fn start(&self) -> Result {
        if self.trim_interval.is_zero() {
            log::info!("Periodic session cache trimming is disabled");
            return Ok(());
        }

        let cancellation = CancellationSource::new();
        self.task.start(self.trim_interval, cancellation.token())?;
        if let Some(previous) = self.cancellation.lock().replace(cancellation) {
            previous.cancel();
        }
        log::info!(
            "Trimming the session cache every {:?}",
            self.trim_interval
        );
        Ok(())
    }

    /// Stop trimming. Does nothing if the cleaner was never started.
    pub fn stop(&self) {
        if let Some(cancellation) = self.cancellation.lock().as_ref() {
            cancellation.cancel();
            log::info!("Stopped trimming the session cache");
        }
    }
}
