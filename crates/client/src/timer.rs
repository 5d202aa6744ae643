use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vizwire_core::{AttemptId, ConnectionEvent, RetryScheduler};

/// Retry timer backed by `tokio::time::sleep`. Scheduling replaces any
/// pending timer.
pub struct TokioRetryScheduler {
    runtime: Handle,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    pending: Option<JoinHandle<()>>,
}

impl TokioRetryScheduler {
    pub fn new(runtime: Handle, events: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self {
            runtime,
            events,
            pending: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&mut self, after: AttemptId, delay: Duration) {
        self.cancel();
        let events = self.events.clone();
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ConnectionEvent::RetryElapsed { after });
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for TokioRetryScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
