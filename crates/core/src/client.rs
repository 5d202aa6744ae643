use std::collections::VecDeque;
use std::time::Duration;

use thiserror::Error;
use vizwire_protocol::Viz;

use crate::config::ClientConfig;
use crate::connection::{AttemptId, ConnectionEvent, ConnectionManager, ConnectionState, Effect};
use crate::endpoint::Endpoint;
use crate::retry::RetryPolicy;
use crate::route::{Resolved, Route, RoutingError};
use crate::store::MessageStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Opens and closes sockets on behalf of the client.
///
/// Implementations report socket activity back as [`ConnectionEvent`]s
/// tagged with the `attempt` passed to [`open`](Self::open).
pub trait Transport {
    fn open(&mut self, attempt: AttemptId, endpoint: &Endpoint) -> Result<(), TransportError>;

    /// Must be idempotent: the client may close an attempt whose socket has
    /// already gone away.
    fn close(&mut self, attempt: AttemptId);
}

/// One-shot retry timer. Firing delivers
/// [`ConnectionEvent::RetryElapsed`] with the same `after`.
pub trait RetryScheduler {
    fn schedule(&mut self, after: AttemptId, delay: Duration);
    fn cancel(&mut self);
}

/// What rendering components read.
#[derive(Debug, Clone, Copy)]
pub struct ViewState<'a> {
    pub state: ConnectionState,
    pub is_connected: bool,
    pub last_error: Option<&'a str>,
    pub endpoint: &'a Endpoint,
    pub records: &'a [Viz],
}

/// Owns the connection state machine and the message store, and performs
/// the effects of each transition.
///
/// Every mutation goes through [`handle`](Self::handle) on the owning
/// thread. Dropping the client tears the connection down.
pub struct VizClient<T: Transport, S: RetryScheduler> {
    manager: ConnectionManager,
    store: MessageStore,
    transport: T,
    scheduler: S,
}

impl<T: Transport, S: RetryScheduler> VizClient<T, S> {
    pub fn new(endpoint: Endpoint, policy: RetryPolicy, transport: T, scheduler: S) -> Self {
        Self {
            manager: ConnectionManager::new(endpoint, policy),
            store: MessageStore::new(),
            transport,
            scheduler,
        }
    }

    pub fn from_config(
        config: &ClientConfig,
        explicit_endpoint: Option<&str>,
        transport: T,
        scheduler: S,
    ) -> Self {
        Self::new(
            config.resolve_endpoint(explicit_endpoint),
            config.retry.clone(),
            transport,
            scheduler,
        )
    }

    pub fn start(&mut self) {
        self.handle(ConnectionEvent::Start);
    }

    /// Feed one event through the state machine and apply the resulting
    /// effects. Follow-up events (a synchronous open failure) are handled
    /// before returning.
    pub fn handle(&mut self, event: ConnectionEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for effect in self.manager.apply(event) {
                if let Some(follow_up) = self.perform(effect) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    fn perform(&mut self, effect: Effect) -> Option<ConnectionEvent> {
        match effect {
            Effect::Open { attempt, endpoint } => {
                match self.transport.open(attempt, &endpoint) {
                    Ok(()) => None,
                    Err(err) => Some(ConnectionEvent::TransportError {
                        attempt,
                        message: err.0,
                    }),
                }
            }
            Effect::Close { attempt } => {
                self.transport.close(attempt);
                None
            }
            Effect::ScheduleRetry { after, delay } => {
                log::info!("retrying {} in {delay:?}", self.manager.endpoint());
                self.scheduler.schedule(after, delay);
                None
            }
            Effect::CancelRetry => {
                self.scheduler.cancel();
                None
            }
            Effect::Append(viz) => {
                log::debug!("received viz update `{}`", viz.name);
                self.store.append(viz);
                None
            }
            Effect::Discard(err) => {
                log::warn!("dropping frame: {err}");
                None
            }
        }
    }

    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.handle(ConnectionEvent::ChangeEndpoint(endpoint));
    }

    pub fn reconnect(&mut self) {
        self.handle(ConnectionEvent::Reconnect);
    }

    pub fn teardown(&mut self) {
        self.handle(ConnectionEvent::Teardown);
    }

    /// Empty the store. The connection is unaffected.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn view(&self) -> ViewState<'_> {
        ViewState {
            state: self.manager.state(),
            is_connected: self.manager.is_connected(),
            last_error: self.manager.last_error(),
            endpoint: self.manager.endpoint(),
            records: self.store.records(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.manager.last_error()
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.manager.endpoint()
    }

    pub fn records(&self) -> &[Viz] {
        self.store.records()
    }

    pub fn get(&self, index: usize) -> Option<&Viz> {
        self.store.get(index)
    }

    pub fn resolve(&self, route: &Route) -> Result<Resolved<'_>, RoutingError> {
        route.resolve(&self.store)
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MessageStore {
        &mut self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

impl<T: Transport, S: RetryScheduler> Drop for VizClient<T, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
