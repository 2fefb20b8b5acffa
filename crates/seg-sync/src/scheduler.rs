use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::monitor::{SyncError, SyncMonitor};

/// A task running at a fixed delay on a named thread.
///
/// The first run happens after `delay`; each later run starts `period` after
/// the previous one finished, so runs never overlap. Cancelling (or
/// dropping) wakes the thread and joins it; a run already in progress is
/// allowed to finish.
pub struct Scheduled {
    name: String,
    cancel: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduled {
    pub fn spawn<F>(
        name: impl Into<String>,
        delay: Duration,
        period: Duration,
        mut task: F,
    ) -> Result<Self, SyncError>
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut wait = delay;
                // Ok(()) is a cancel; Disconnected means the owner is gone.
                while let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(wait) {
                    task();
                    wait = period;
                }
            })?;
        debug!(task = %name, ?delay, ?period, "scheduled");
        Ok(Self {
            name,
            cancel: Some(cancel_tx),
            handle: Some(handle),
        })
    }

    /// Poll `monitor` on a fixed delay. Poll errors are already logged by
    /// the monitor and do not stop the schedule.
    pub fn monitor(
        monitor: Arc<SyncMonitor>,
        delay: Duration,
        period: Duration,
    ) -> Result<Self, SyncError> {
        let name = format!("seg-sync-{}-{}", monitor.domain(), monitor.kind());
        Self::spawn(name, delay, period, move || {
            let _ = monitor.poll();
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for its thread to exit.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(task = %self.name, "scheduled task panicked");
            } else {
                debug!(task = %self.name, "cancelled");
            }
        }
    }
}

impl Drop for Scheduled {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Scheduled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduled")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
