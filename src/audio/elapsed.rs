//! Once-per-second recording clock.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Counts whole seconds spent recording. Freezing aborts the ticker, so
/// paused time is never counted; restarting begins a fresh one-second period.
pub struct ElapsedCounter {
    seconds: Arc<watch::Sender<u64>>,
    ticker: Option<JoinHandle<()>>,
}

impl ElapsedCounter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            seconds: Arc::new(tx),
            ticker: None,
        }
    }

    /// Start (or resume) ticking. Must be called within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let seconds = self.seconds.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK, TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                seconds.send_modify(|s| *s += 1);
            }
        }));
    }

    /// Stop ticking, keeping the current count.
    pub fn freeze(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    pub fn reset(&mut self) {
        self.freeze();
        self.seconds.send_replace(0);
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn seconds(&self) -> u64 {
        *self.seconds.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.seconds.subscribe()
    }
}

impl Default for ElapsedCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ElapsedCounter {
    fn drop(&mut self) {
        self.freeze();
    }
}
