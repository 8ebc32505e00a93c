//! A [`Ticker`] driven on its own Tokio task.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{TickConfig, TickInfo, Ticker};

/// Returned by the per-tick closure of a [`PeriodicTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// Runs a closure on every tick until stopped.
///
/// `stop()` is idempotent and takes effect before the next tick. Dropping
/// the handle stops the task as well.
pub struct PeriodicTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawns the task. Must be called inside a Tokio runtime.
    pub fn spawn<F>(name: &'static str, config: TickConfig, mut on_tick: F) -> Self
    where
        F: FnMut(TickInfo) -> TickFlow + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let mut ticker = Ticker::new(config);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        // A dropped sender means the handle is gone too.
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    info = ticker.wait_for_tick() => {
                        let flow = on_tick(info);
                        ticker.record_tick_end();
                        if flow == TickFlow::Stop {
                            break;
                        }
                    }
                }
            }
            debug!(task = name, ticks = ticker.tick_count(), "periodic task finished");
        });

        debug!(task = name, "periodic task started");
        Self {
            name,
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stops the task. Calling it again does nothing.
    pub fn stop(&self) {
        let changed = self.stop_tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
        if changed {
            debug!(task = self.name, "periodic task stop requested");
        }
    }

    /// Whether the task has stopped, either through [`stop`](Self::stop)
    /// or because the closure returned [`TickFlow::Stop`].
    pub fn is_finished(&self) -> bool {
        *self.stop_tx.borrow()
            || self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Stops the task and waits for it to exit.
    pub async fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
