//! Native host for [`VizClient`]: sockets and retry timers run as tokio
//! tasks and post [`ConnectionEvent`]s into a queue; the thread that owns
//! the [`Session`] drains the queue and is the only one mutating client
//! state.

mod timer;
mod transport;

pub use timer::TokioRetryScheduler;
pub use transport::TokioTransport;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use vizwire_core::{ClientConfig, ConnectionEvent, Endpoint, RetryPolicy, VizClient};

pub type NativeClient = VizClient<TokioTransport, TokioRetryScheduler>;

pub struct Session {
    client: NativeClient,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Session {
    /// `runtime` hosts the socket and timer tasks. It may belong to another
    /// thread; only events cross over.
    pub fn new(runtime: Handle, endpoint: Endpoint, policy: RetryPolicy) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let transport = TokioTransport::new(runtime.clone(), tx.clone());
        let scheduler = TokioRetryScheduler::new(runtime, tx);
        Self {
            client: VizClient::new(endpoint, policy, transport, scheduler),
            events,
        }
    }

    pub fn from_config(runtime: Handle, config: &ClientConfig, explicit: Option<&str>) -> Self {
        Self::new(
            runtime,
            config.resolve_endpoint(explicit),
            config.retry.clone(),
        )
    }

    pub fn client(&self) -> &NativeClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut NativeClient {
        &mut self.client
    }

    pub fn start(&mut self) {
        self.client.start();
    }

    /// Handle every queued event without waiting. Returns how many were
    /// handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.client.handle(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next event and handle it. Returns `false` if the queue
    /// has closed.
    pub async fn next(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                self.client.handle(event);
                true
            }
            None => false,
        }
    }

    /// Handle events until `done` holds for the client.
    pub async fn run_until(&mut self, mut done: impl FnMut(&NativeClient) -> bool) {
        while !done(&self.client) {
            if !self.next().await {
                break;
            }
        }
    }
}
