//! Session tracker: checked-in flag, elapsed-time counter and its tick task

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::debug;

/// Snapshot of a session taken when it was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoppedSession {
    pub start_time: Option<DateTime<Local>>,
    /// Whole seconds counted by the timer
    pub duration_secs: u64,
}

/// Local session state.
///
/// The timer is a shared counter incremented once per tick by a spawned
/// task. Only the tick is cancellable.
#[derive(Debug)]
pub struct SessionTracker {
    checked_in: bool,
    start_time: Option<DateTime<Local>>,
    timer: Arc<AtomicU64>,
    tick_interval: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl SessionTracker {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            checked_in: false,
            start_time: None,
            timer: Arc::new(AtomicU64::new(0)),
            tick_interval,
            ticker: None,
        }
    }

    pub fn is_checked_in(&self) -> bool {
        self.checked_in
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start_time
    }

    pub fn timer_seconds(&self) -> u64 {
        self.timer.load(Ordering::SeqCst)
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Begin a session at `start_time` with the timer at `elapsed_secs`.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, start_time: DateTime<Local>, elapsed_secs: u64) {
        self.cancel_tick();
        self.checked_in = true;
        self.start_time = Some(start_time);
        self.timer.store(elapsed_secs, Ordering::SeqCst);
        self.spawn_tick();
    }

    /// Cancel the tick and capture the counted duration
    pub fn stop(&mut self) -> StoppedSession {
        self.cancel_tick();
        self.checked_in = false;
        StoppedSession {
            start_time: self.start_time,
            duration_secs: self.timer_seconds(),
        }
    }

    /// Undo a [`stop`](Self::stop): check back in and keep counting from
    /// the captured duration
    pub fn resume(&mut self, stopped: StoppedSession) {
        self.cancel_tick();
        self.checked_in = true;
        self.start_time = stopped.start_time;
        self.timer.store(stopped.duration_secs, Ordering::SeqCst);
        self.spawn_tick();
    }

    /// Not checked in, timer at zero, no start time
    pub fn reset(&mut self) {
        self.cancel_tick();
        self.checked_in = false;
        self.start_time = None;
        self.timer.store(0, Ordering::SeqCst);
    }

    fn spawn_tick(&mut self) {
        let timer = Arc::clone(&self.timer);
        let period = self.tick_interval;
        let first = tokio::time::Instant::now() + period;

        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = interval_at(first, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let _ = timer.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |secs| {
                    Some(secs.saturating_add(1))
                });
            }
        }));
        debug!(period_ms = period.as_millis() as u64, "Session tick started");
    }

    fn cancel_tick(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            debug!("Session tick cancelled");
        }
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.cancel_tick();
    }
}
