use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt::{Debug, Formatter};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// The callback a [`Timer`] fires once per interval.
/// Returning [`ControlFlow::Break`] stops the timer.
pub type Tick = Box<dyn FnMut() -> ControlFlow<()> + Send>;

/// The ability to fire a callback repeatedly.
pub trait Timer: Debug + Send {
    /// Fire `tick` every `interval`, starting one `interval` from now.
    /// A timer that is already started is stopped first.
    fn start(&mut self, interval: Duration, tick: Tick) -> Result;

    /// Stop firing. Does nothing if the timer is not started.
    /// A tick that is currently executing runs to completion.
    fn stop(&mut self);

    /// Returns true if the timer is started and was not stopped since.
    fn is_started(&self) -> bool;
}

/// A timer that fires its ticks on a dedicated background thread.
///
/// Stopping the timer wakes the thread immediately and waits for it to finish.
/// If a tick runs longer than the interval, the missed ticks are skipped rather than queued.
#[derive(Debug, Default)]
pub struct ThreadTimer {
    running: Option<RunningTimer>,
}

#[derive(Debug)]
struct RunningTimer {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    /// Block until `timeout` has passed or the signal was raised.
    /// A timeout beyond the range of [`Instant`] waits for the signal only.
    /// Returns true if the signal was raised.
    fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut stopped = self.stopped.lock();
        while !*stopped {
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
                None => self.condvar.wait(&mut stopped),
            }
        }
        *stopped
    }

    fn raise(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    fn is_raised(&self) -> bool {
        *self.stopped.lock()
    }
}

impl ThreadTimer {
    /// Create a timer that is not started.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Timer for ThreadTimer {
    fn start(&mut self, interval: Duration, mut tick: Tick) -> Result {
        self.stop();

        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name("inproc-session-timer".to_string())
            .spawn(move || loop {
                if thread_signal.wait_for(interval) {
                    break;
                }
                if tick().is_break() {
                    thread_signal.raise();
                    break;
                }
            })
            .map_err(Error::TimerThread)?;

        self.running = Some(RunningTimer { signal, handle });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(RunningTimer { signal, handle }) = self.running.take() else {
            return;
        };
        signal.raise();
        if handle.thread().id() == thread::current().id() {
            // Stopped from within a tick, the loop exits once the tick returns.
            return;
        }
        if handle.join().is_err() {
            log::warn!("The session timer thread panicked");
        }
    }

    fn is_started(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.signal.is_raised())
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A timer that only fires when virtual time is advanced with [`ManualTimer::elapse`].
///
/// **This timer is supposed to be used in tests only.**
/// Clones share the same state, so a test can keep a clone to drive a timer it handed away.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualTimerState>>,
}

#[derive(Default)]
struct ManualTimerState {
    tick: Option<Tick>,
    interval: Duration,
    elapsed: Duration,
    started: bool,
}

impl Debug for ManualTimerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTimerState")
            .field("interval", &self.interval)
            .field("elapsed", &self.elapsed)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl ManualTimer {
    /// Create a timer that is not started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance virtual time by `duration`, synchronously firing the tick once for every
    /// interval boundary that is crossed.
    pub fn elapse(&self, duration: Duration) {
        let (mut tick, executions) = {
            let mut state = self.state.lock();
            let before = state.elapsed;
            let after = before.saturating_add(duration);
            state.elapsed = after;
            if !state.started || state.interval.is_zero() {
                return;
            }

            let interval = state.interval.as_nanos();
            let executions = after.as_nanos() / interval - before.as_nanos() / interval;
            match state.tick.take() {
                Some(tick) => (tick, executions),
                None => return,
            }
        };

        // Ticks run without holding the state lock, so they may use the timer themselves.
        let mut stopped = false;
        for _ in 0..executions {
            if tick().is_break() {
                stopped = true;
                break;
            }
        }

        let mut state = self.state.lock();
        if stopped {
            state.started = false;
        } else if state.started && state.tick.is_none() {
            state.tick = Some(tick);
        }
    }
}

impl Timer for ManualTimer {
    fn start(&mut self, interval: Duration, tick: Tick) -> Result {
        let mut state = self.state.lock();
        state.tick = Some(tick);
        state.interval = interval;
        state.elapsed = Duration::ZERO;
        state.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.started = false;
        state.tick = None;
    }

    fn is_started(&self) -> bool {
        self.state.lock().started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn counting_tick(counter: &Arc<AtomicUsize>) -> Tick {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
    }

    #[test]
    fn manual_timer_fires_once_per_interval_boundary() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = ManualTimer::new();
        timer
            .start(Duration::from_secs(10), counting_tick(&counter))
            .unwrap();

        timer.elapse(Duration::from_secs(9));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        timer.elapse(Duration::from_secs(1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        timer.elapse(Duration::from_secs(25));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn manual_timer_does_not_fire_when_stopped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = ManualTimer::new();
        timer
            .start(Duration::from_secs(1), counting_tick(&counter))
            .unwrap();
        timer.stop();
        timer.elapse(Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!timer.is_started());
    }

    #[test]
    fn manual_timer_stops_when_tick_breaks() {
        let mut timer = ManualTimer::new();
        timer
            .start(Duration::from_secs(1), Box::new(|| ControlFlow::Break(())))
            .unwrap();
        timer.elapse(Duration::from_secs(3));
        assert!(!timer.is_started());
    }

    #[test]
    fn thread_timer_fires_until_stopped() {
        let (sender, receiver) = mpsc::channel();
        let mut timer = ThreadTimer::new();
        timer
            .start(
                Duration::from_millis(5),
                Box::new(move || {
                    let _ = sender.send(());
                    ControlFlow::Continue(())
                }),
            )
            .unwrap();
        assert!(timer.is_started());

        for _ in 0..3 {
            receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        timer.stop();
        assert!(!timer.is_started());
        while receiver.try_recv().is_ok() {}
        assert!(receiver.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn thread_timer_stop_wakes_a_sleeping_thread() {
        let mut timer = ThreadTimer::new();
        timer
            .start(Duration::from_secs(3600), Box::new(|| ControlFlow::Continue(())))
            .unwrap();
        let stop_started = Instant::now();
        timer.stop();
        assert!(stop_started.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn thread_timer_survives_intervals_beyond_instant_range() {
        let mut timer = ThreadTimer::new();
        timer
            .start(Duration::MAX, Box::new(|| ControlFlow::Continue(())))
            .unwrap();
        thread::sleep(Duration::from_millis(50));

        let running = timer.running.as_ref().unwrap();
        assert!(!running.handle.is_finished());
        assert!(timer.is_started());

        let stop_started = Instant::now();
        timer.stop();
        assert!(stop_started.elapsed() < Duration::from_secs(60));
        assert!(!timer.is_started());
    }
}
