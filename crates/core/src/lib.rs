pub mod client;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod retry;
pub mod route;
pub mod store;

pub use client::{RetryScheduler, Transport, TransportError, ViewState, VizClient};
pub use config::{ClientConfig, ConfigError};
pub use connection::{AttemptId, ConnectionEvent, ConnectionManager, ConnectionState, Effect};
pub use endpoint::{DEFAULT_ENDPOINT, Endpoint};
pub use retry::{ReconnectMode, RetryPolicy};
pub use route::{Resolved, Route, RoutingError};
pub use store::{MessageStore, StoreChange, SubscriptionId};
