//! Live countdown for denied or blocked limiters.
//!
//! A `Countdown` re-evaluates a probe once per second and publishes the
//! remaining seconds on a watch channel. The ticker stops by itself when
//! the probe reaches zero, and is aborted when the `Countdown` is dropped,
//! so no timer outlives the display that asked for it.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

/// Re-evaluation period for live countdowns.
pub const TICK: Duration = Duration::from_secs(1);

/// Format seconds as `"Xm Ys"` when at least a minute remains, else `"Ys"`.
pub fn format_remaining(secs: u64) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// A periodic countdown task with an explicit start/cancel lifecycle.
#[derive(Debug)]
pub struct Countdown {
    rx: watch::Receiver<u64>,
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Start ticking `probe` every second.
    ///
    /// Must be called from within a Tokio runtime. If the probe already
    /// reads zero, no ticks are scheduled.
    pub fn start<F>(probe: F) -> Self
    where
        F: Fn() -> u64 + Send + 'static,
    {
        let initial = probe();
        let (tx, rx) = watch::channel(initial);

        let handle = tokio::spawn(async move {
            if initial == 0 {
                return;
            }

            let mut ticker = tokio::time::interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let remaining = probe();
                trace!(remaining = remaining, "Countdown tick");

                if tx.send(remaining).is_err() || remaining == 0 {
                    break;
                }
            }
        });

        Self { rx, handle }
    }

    /// Last published remaining seconds.
    pub fn remaining(&self) -> u64 {
        *self.rx.borrow()
    }

    /// Last published value, formatted for display.
    pub fn remaining_display(&self) -> String {
        format_remaining(self.remaining())
    }

    /// Wait for the next published value.
    ///
    /// Returns `None` once the ticker has stopped.
    pub async fn changed(&mut self) -> Option<u64> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// A receiver that observes every published value.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rx.clone()
    }

    /// Whether the ticker task is still alive.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the ticker.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
