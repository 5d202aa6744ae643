use std::fmt;
use std::time::Duration;

use vizwire_protocol::{DecodeError, Frame, Viz};

use crate::endpoint::Endpoint;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Errored => "errored",
        })
    }
}

/// Identifies one connection attempt. Transports tag every event with the
/// attempt that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inputs to the connection state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Application start.
    Start,
    Opened {
        attempt: AttemptId,
    },
    Frame {
        attempt: AttemptId,
        frame: Frame,
    },
    TransportError {
        attempt: AttemptId,
        message: String,
    },
    Closed {
        attempt: AttemptId,
        reason: Option<String>,
    },
    /// The retry timer scheduled after `after` failed has fired.
    RetryElapsed {
        after: AttemptId,
    },
    /// The host could not arm the retry timer for `after`.
    RetryUnavailable {
        after: AttemptId,
        message: String,
    },
    /// The user picked a different data source.
    ChangeEndpoint(Endpoint),
    /// User-initiated reconnect from a failed or idle state.
    Reconnect,
    /// The owning view is going away.
    Teardown,
}

/// Work the host must perform after a transition.
#[derive(Debug)]
pub enum Effect {
    Open {
        attempt: AttemptId,
        endpoint: Endpoint,
    },
    Close {
        attempt: AttemptId,
    },
    ScheduleRetry {
        after: AttemptId,
        delay: Duration,
    },
    CancelRetry,
    Append(Viz),
    Discard(DecodeError),
}

/// The client-side connection lifecycle as a pure state machine.
///
/// [`transition`](Self::transition) maps `(state, event)` to
/// `(next state, effects)` without touching a socket or a timer, so the
/// retry logic is testable in isolation. Invariants:
///
/// - at most one attempt is live; events tagged with any other attempt are
///   ignored,
/// - at most one retry timer is pending,
/// - after [`ConnectionEvent::Teardown`] every event is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionManager {
    state: ConnectionState,
    endpoint: Endpoint,
    policy: RetryPolicy,
    attempt: AttemptId,
    failures: u32,
    ever_connected: bool,
    last_error: Option<String>,
    pending_retry: Option<AttemptId>,
    torn_down: bool,
}

impl ConnectionManager {
    pub fn new(endpoint: Endpoint, policy: RetryPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            endpoint,
            policy,
            attempt: AttemptId::default(),
            failures: 0,
            ever_connected: false,
            last_error: None,
            pending_retry: None,
            torn_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The current (most recent) attempt.
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Consecutive failures since the last successful open.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn ever_connected(&self) -> bool {
        self.ever_connected
    }

    pub fn retry_pending(&self) -> bool {
        self.pending_retry.is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn transition(&self, event: ConnectionEvent) -> (Self, Vec<Effect>) {
        let mut next = self.clone();
        let effects = next.step(event);
        (next, effects)
    }

    /// In-place form of [`transition`](Self::transition).
    pub fn apply(&mut self, event: ConnectionEvent) -> Vec<Effect> {
        self.step(event)
    }

    fn step(&mut self, event: ConnectionEvent) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }

        match event {
            ConnectionEvent::Start => {
                if self.state == ConnectionState::Disconnected && self.attempt == AttemptId(0) {
                    vec![self.begin_attempt()]
                } else {
                    Vec::new()
                }
            }
            ConnectionEvent::Opened { attempt } => {
                if !self.is_live(attempt) || self.state != ConnectionState::Connecting {
                    return Vec::new();
                }
                log::info!("connected to {} ({attempt})", self.endpoint);
                self.state = ConnectionState::Connected;
                self.failures = 0;
                self.last_error = None;
                self.ever_connected = true;
                Vec::new()
            }
            ConnectionEvent::Frame { attempt, frame } => {
                if !self.is_live(attempt) || self.state != ConnectionState::Connected {
                    log::debug!("ignoring frame from inactive attempt {attempt}");
                    return Vec::new();
                }
                match frame.decode() {
                    Ok(viz) => vec![Effect::Append(viz)],
                    Err(err) => vec![Effect::Discard(err)],
                }
            }
            ConnectionEvent::TransportError { attempt, message } => {
                if !self.is_live(attempt) {
                    return Vec::new();
                }
                self.fail(message)
            }
            ConnectionEvent::Closed { attempt, reason } => {
                if !self.is_live(attempt) {
                    return Vec::new();
                }
                self.fail(reason.unwrap_or_else(|| "connection closed".to_string()))
            }
            ConnectionEvent::RetryElapsed { after } => {
                if self.pending_retry != Some(after) {
                    return Vec::new();
                }
                self.pending_retry = None;
                if self.state == ConnectionState::Errored {
                    vec![self.begin_attempt()]
                } else {
                    Vec::new()
                }
            }
            ConnectionEvent::RetryUnavailable { after, message } => {
                if self.pending_retry != Some(after) {
                    return Vec::new();
                }
                // Left Errored for a manual reconnect.
                log::warn!("retry after {after} unavailable: {message}");
                self.pending_retry = None;
                self.last_error = Some(message);
                Vec::new()
            }
            ConnectionEvent::ChangeEndpoint(endpoint) => {
                let mut effects = self.release();
                log::info!("switching endpoint {} -> {endpoint}", self.endpoint);
                self.endpoint = endpoint;
                self.ever_connected = false;
                self.failures = 0;
                self.last_error = None;
                effects.push(self.begin_attempt());
                effects
            }
            ConnectionEvent::Reconnect => match self.state {
                ConnectionState::Errored | ConnectionState::Disconnected => {
                    let mut effects = self.release();
                    effects.push(self.begin_attempt());
                    effects
                }
                ConnectionState::Connecting | ConnectionState::Connected => Vec::new(),
            },
            ConnectionEvent::Teardown => {
                let effects = self.release();
                self.state = ConnectionState::Disconnected;
                self.torn_down = true;
                effects
            }
        }
    }

    fn is_live(&self, attempt: AttemptId) -> bool {
        attempt == self.attempt
            && matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Connected
            )
    }

    fn begin_attempt(&mut self) -> Effect {
        self.attempt = self.attempt.next();
        self.state = ConnectionState::Connecting;
        log::debug!("connecting to {} ({})", self.endpoint, self.attempt);
        Effect::Open {
            attempt: self.attempt,
            endpoint: self.endpoint.clone(),
        }
    }

    /// Move the live attempt to `Errored` and decide on a retry.
    fn fail(&mut self, message: String) -> Vec<Effect> {
        log::warn!("connection to {} failed: {message}", self.endpoint);
        self.state = ConnectionState::Errored;
        self.last_error = Some(message);
        self.failures = self.failures.saturating_add(1);

        let mut effects = vec![Effect::Close {
            attempt: self.attempt,
        }];
        if self.policy.should_retry(self.ever_connected) {
            let delay = self.policy.delay_for(self.failures);
            self.pending_retry = Some(self.attempt);
            effects.push(Effect::ScheduleRetry {
                after: self.attempt,
                delay,
            });
        } else {
            log::info!("not retrying {}: connection was established before", self.endpoint);
        }
        effects
    }

    /// Close the live transport and cancel a pending retry, if any.
    fn release(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            effects.push(Effect::Close {
                attempt: self.attempt,
            });
        }
        if self.pending_retry.take().is_some() {
            effects.push(Effect::CancelRetry);
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ReconnectMode;

    const SAMPLE: &str = r#"{"VizUpdate":{"name":"a","source":null,"widgets":[{"plot_scalar":{"data_x":[[0,1],[1,2]]}}],"range":null}}"#;

    fn manager(mode: ReconnectMode) -> ConnectionManager {
        let policy = RetryPolicy {
            mode,
            ..RetryPolicy::default()
        };
        ConnectionManager::new(Endpoint::default(), policy)
    }

    fn text(attempt: AttemptId, body: &str) -> ConnectionEvent {
        ConnectionEvent::Frame {
            attempt,
            frame: Frame::Text(body.to_string()),
        }
    }

    fn opened_attempt(effects: &[Effect]) -> AttemptId {
        match effects {
            [.., Effect::Open { attempt, .. }] => *attempt,
            other => panic!("expected an Open effect, got {other:?}"),
        }
    }

    #[test]
    fn start_opens_first_attempt() {
        let m = manager(ReconnectMode::UntilFirstSuccess);
        assert_eq!(m.state(), ConnectionState::Disconnected);

        let (m, effects) = m.transition(ConnectionEvent::Start);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(matches!(
            &effects[..],
            [Effect::Open { endpoint, .. }] if endpoint.as_str() == "ws://localhost:3031/ws"
        ));

        // A second start is a no-op.
        let (again, effects) = m.transition(ConnectionEvent::Start);
        assert!(effects.is_empty());
        assert_eq!(again, m);
    }

    #[test]
    fn transition_leaves_input_untouched() {
        let m = manager(ReconnectMode::UntilFirstSuccess);
        let before = m.clone();
        let _ = m.transition(ConnectionEvent::Start);
        assert_eq!(m, before);
    }

    #[test]
    fn open_connects_and_clears_error() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let first = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::TransportError {
            attempt: first,
            message: "refused".into(),
        });
        assert_eq!(m.last_error(), Some("refused"));
        assert_eq!(m.failures(), 1);

        let second = opened_attempt(&m.apply(ConnectionEvent::RetryElapsed { after: first }));
        assert_eq!(m.state(), ConnectionState::Connecting);
        m.apply(ConnectionEvent::Opened { attempt: second });
        assert!(m.is_connected());
        assert_eq!(m.last_error(), None);
        assert_eq!(m.failures(), 0);
    }

    #[test]
    fn failures_before_first_success_back_off() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let mut attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        let mut delays = Vec::new();
        for _ in 0..4 {
            let effects = m.apply(ConnectionEvent::Closed {
                attempt,
                reason: None,
            });
            assert_eq!(m.state(), ConnectionState::Errored);
            match &effects[..] {
                [Effect::Close { .. }, Effect::ScheduleRetry { after, delay }] => {
                    assert_eq!(*after, attempt);
                    delays.push(delay.as_millis());
                }
                other => panic!("unexpected effects {other:?}"),
            }
            attempt = opened_attempt(&m.apply(ConnectionEvent::RetryElapsed { after: attempt }));
        }
        assert_eq!(delays, vec![250, 500, 1000, 2000]);
    }

    #[test]
    fn error_then_close_schedules_one_retry() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        let on_error = m.apply(ConnectionEvent::TransportError {
            attempt,
            message: "reset".into(),
        });
        let on_close = m.apply(ConnectionEvent::Closed {
            attempt,
            reason: Some("1006".into()),
        });
        assert_eq!(
            on_error
                .iter()
                .filter(|e| matches!(e, Effect::ScheduleRetry { .. }))
                .count(),
            1
        );
        assert!(on_close.is_empty());
        assert_eq!(m.last_error(), Some("reset"));
    }

    #[test]
    fn drop_after_success_does_not_retry_by_default() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Opened { attempt });
        let effects = m.apply(ConnectionEvent::Closed {
            attempt,
            reason: None,
        });

        assert!(!m.is_connected());
        assert_eq!(m.state(), ConnectionState::Errored);
        assert!(matches!(&effects[..], [Effect::Close { .. }]));
        assert!(!m.retry_pending());

        // Nothing brings it back on its own.
        let stale_timer = m.apply(ConnectionEvent::RetryElapsed { after: attempt });
        assert!(stale_timer.is_empty());
        assert_eq!(m.state(), ConnectionState::Errored);
    }

    #[test]
    fn error_after_success_does_not_retry_by_default() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Opened { attempt });
        let effects = m.apply(ConnectionEvent::TransportError {
            attempt,
            message: "reset by peer".into(),
        });

        assert!(matches!(&effects[..], [Effect::Close { attempt: a }] if *a == attempt));
        assert_eq!(m.state(), ConnectionState::Errored);
        assert_eq!(m.last_error(), Some("reset by peer"));
        assert!(!m.retry_pending());
    }

    #[test]
    fn unavailable_retry_timer_leaves_manual_reconnect() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Closed {
            attempt,
            reason: None,
        });
        assert!(m.retry_pending());

        let stale = m.apply(ConnectionEvent::RetryUnavailable {
            after: AttemptId(attempt.get() + 7),
            message: "no timer".into(),
        });
        assert!(stale.is_empty());
        assert!(m.retry_pending());

        let effects = m.apply(ConnectionEvent::RetryUnavailable {
            after: attempt,
            message: "setTimeout failed".into(),
        });
        assert!(effects.is_empty());
        assert!(!m.retry_pending());
        assert_eq!(m.state(), ConnectionState::Errored);
        assert_eq!(m.last_error(), Some("setTimeout failed"));

        let next = opened_attempt(&m.apply(ConnectionEvent::Reconnect));
        assert!(next > attempt);
    }

    #[test]
    fn drop_after_success_retries_in_always_mode() {
        let mut m = manager(ReconnectMode::Always);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Opened { attempt });
        let effects = m.apply(ConnectionEvent::Closed {
            attempt,
            reason: None,
        });
        assert!(matches!(
            &effects[..],
            [Effect::Close { .. }, Effect::ScheduleRetry { .. }]
        ));

        let next = opened_attempt(&m.apply(ConnectionEvent::RetryElapsed { after: attempt }));
        assert!(next > attempt);
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn reconnect_recovers_from_errored() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Opened { attempt });
        m.apply(ConnectionEvent::Closed {
            attempt,
            reason: None,
        });

        let effects = m.apply(ConnectionEvent::Reconnect);
        assert!(matches!(&effects[..], [Effect::Open { .. }]));
        assert_eq!(m.state(), ConnectionState::Connecting);

        // Already connecting: reconnect is ignored.
        assert!(m.apply(ConnectionEvent::Reconnect).is_empty());
    }

    #[test]
    fn reconnect_cancels_pending_retry() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Closed {
            attempt,
            reason: None,
        });
        assert!(m.retry_pending());

        let effects = m.apply(ConnectionEvent::Reconnect);
        assert!(matches!(
            &effects[..],
            [Effect::CancelRetry, Effect::Open { .. }]
        ));
        assert!(m.apply(ConnectionEvent::RetryElapsed { after: attempt }).is_empty());
    }

    #[test]
    fn stale_attempt_events_are_ignored() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let old = opened_attempt(&m.apply(ConnectionEvent::Start));
        let new = opened_attempt(
            &m.apply(ConnectionEvent::ChangeEndpoint(Endpoint::new("ws://other/ws"))),
        );
        assert_ne!(old, new);

        let before = m.clone();
        assert!(m.apply(ConnectionEvent::Opened { attempt: old }).is_empty());
        assert!(m.apply(text(old, SAMPLE)).is_empty());
        assert!(
            m.apply(ConnectionEvent::Closed {
                attempt: old,
                reason: None
            })
            .is_empty()
        );
        assert_eq!(m, before);
    }

    #[test]
    fn change_endpoint_resets_history() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Opened { attempt });
        assert!(m.ever_connected());

        let effects = m.apply(ConnectionEvent::ChangeEndpoint(Endpoint::new(
            "ws://127.0.0.1:3031/ws",
        )));
        assert!(matches!(
            &effects[..],
            [Effect::Close { attempt: closed }, Effect::Open { endpoint, .. }]
                if *closed == attempt && endpoint.as_str() == "ws://127.0.0.1:3031/ws"
        ));
        assert!(!m.ever_connected());
        assert_eq!(m.endpoint().as_str(), "ws://127.0.0.1:3031/ws");

        // A failure on the new endpoint retries again.
        let current = m.attempt();
        let effects = m.apply(ConnectionEvent::TransportError {
            attempt: current,
            message: "refused".into(),
        });
        assert!(effects.iter().any(|e| matches!(e, Effect::ScheduleRetry { .. })));
    }

    #[test]
    fn frames_decode_or_discard() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));

        // Frames before open are not delivered.
        assert!(m.apply(text(attempt, SAMPLE)).is_empty());

        m.apply(ConnectionEvent::Opened { attempt });
        match &m.apply(text(attempt, SAMPLE))[..] {
            [Effect::Append(viz)] => assert_eq!(viz.name, "a"),
            other => panic!("unexpected effects {other:?}"),
        }
        assert!(matches!(
            &m.apply(text(attempt, r#"{"Hello":{}}"#))[..],
            [Effect::Discard(DecodeError::MissingEnvelope)]
        ));
        assert!(m.is_connected());
    }

    #[test]
    fn teardown_releases_and_ignores_everything_after() {
        let mut m = manager(ReconnectMode::UntilFirstSuccess);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Closed {
            attempt,
            reason: None,
        });
        assert!(m.retry_pending());

        let effects = m.apply(ConnectionEvent::Teardown);
        assert!(matches!(&effects[..], [Effect::CancelRetry]));
        assert!(m.is_torn_down());
        assert_eq!(m.state(), ConnectionState::Disconnected);

        assert!(m.apply(ConnectionEvent::RetryElapsed { after: attempt }).is_empty());
        assert!(m.apply(ConnectionEvent::Reconnect).is_empty());
        assert!(m.apply(ConnectionEvent::Start).is_empty());
    }

    #[test]
    fn teardown_while_connected_closes_transport() {
        let mut m = manager(ReconnectMode::Always);
        let attempt = opened_attempt(&m.apply(ConnectionEvent::Start));
        m.apply(ConnectionEvent::Opened { attempt });
        let effects = m.apply(ConnectionEvent::Teardown);
        assert!(matches!(&effects[..], [Effect::Close { attempt: a }] if *a == attempt));
    }
}
