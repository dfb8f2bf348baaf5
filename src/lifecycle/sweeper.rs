//! Periodic background sweeps with cooperative shutdown.
//!
//! The rate limiter and the conversation cache both need an eviction pass on
//! a fixed interval. Rather than each owning an ad hoc timer loop, they hand
//! a `sweep` closure to a `Sweeper`, which owns the ticker and exits cleanly
//! on the shutdown signal. Tests bypass the ticker entirely and call the
//! component's `sweep()` under paused time.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

/// A named periodic task.
pub struct Sweeper {
    name: &'static str,
    interval: Duration,
}

impl Sweeper {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self { name, interval }
    }

    /// Spawn the sweep loop. The closure runs once per interval until the
    /// shutdown signal arrives; the returned handle joins after the loop
    /// exits.
    pub fn spawn<F>(self, mut shutdown: broadcast::Receiver<()>, mut sweep: F) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        tokio::spawn(async move {
            tracing::info!(
                task = self.name,
                interval_ms = self.interval.as_millis() as u64,
                "Sweeper starting"
            );

            let mut ticker = time::interval(self.interval);
            // The first tick of a tokio interval fires immediately; an early
            // sweep over empty maps is harmless.
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep();
                    }
                    _ = shutdown.recv() => {
                        tracing::info!(task = self.name, "Sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}
