//! Integration test: connect the native client to a real bridge on an
//! ephemeral localhost port.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::time::timeout;
use vizwire_bridge::{BridgeOptions, Replay, serve};
use vizwire_client::Session;
use vizwire_core::{ConnectionState, Endpoint, ReconnectMode, RetryPolicy};
use vizwire_protocol::{Recording, Viz};

const DEADLINE: Duration = Duration::from_secs(10);

fn recording(names: &[&str]) -> Recording {
    let mut recording = Recording::new("test", "live");
    for name in names {
        recording.add_viz(Viz::new(*name));
    }
    recording
}

async fn start_bridge(recording: &Recording, hang_up: bool) -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let replay = Replay::new(recording).unwrap();
    let options = BridgeOptions {
        interval: Duration::from_millis(1),
        hang_up,
        ..BridgeOptions::default()
    };
    tokio::spawn(serve(listener, replay, options));
    Endpoint::new(format!("ws://{addr}/ws"))
}

fn fast_policy(mode: ReconnectMode) -> RetryPolicy {
    RetryPolicy {
        initial_delay_ms: 10,
        max_delay_ms: 50,
        multiplier: 2.0,
        mode,
    }
}

#[tokio::test]
async fn receives_records_in_order() {
    let endpoint = start_bridge(&recording(&["a", "b", "c"]), false).await;
    let mut session = Session::new(
        Handle::current(),
        endpoint,
        fast_policy(ReconnectMode::UntilFirstSuccess),
    );
    session.start();

    timeout(DEADLINE, session.run_until(|c| c.records().len() == 3))
        .await
        .expect("records arrive");

    let client = session.client();
    assert!(client.is_connected());
    assert!(client.last_error().is_none());
    let names: Vec<&str> = client.records().iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn hang_up_after_first_success_is_final_by_default() {
    let endpoint = start_bridge(&recording(&["only"]), true).await;
    let mut session = Session::new(
        Handle::current(),
        endpoint,
        fast_policy(ReconnectMode::UntilFirstSuccess),
    );
    session.start();

    timeout(
        DEADLINE,
        session.run_until(|c| c.manager().state() == ConnectionState::Errored),
    )
    .await
    .expect("server hangs up");

    let client = session.client();
    assert!(!client.is_connected());
    assert_eq!(client.records().len(), 1);
    assert!(!client.manager().retry_pending());
    assert!(!client.scheduler().is_pending());

    // Nothing else should happen on its own.
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.drain();
    assert_eq!(session.client().manager().state(), ConnectionState::Errored);
    assert_eq!(session.client().records().len(), 1);
}

#[tokio::test]
async fn hang_up_reconnects_in_always_mode() {
    let endpoint = start_bridge(&recording(&["x", "y"]), true).await;
    let mut session = Session::new(
        Handle::current(),
        endpoint,
        fast_policy(ReconnectMode::Always),
    );
    session.start();

    // Every reconnect replays the recording again.
    timeout(DEADLINE, session.run_until(|c| c.records().len() >= 4))
        .await
        .expect("replayed after reconnect");

    let names: Vec<&str> = session.client().records()[..4]
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(names, vec!["x", "y", "x", "y"]);
}

#[tokio::test]
async fn refused_connection_schedules_retry() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut session = Session::new(
        Handle::current(),
        Endpoint::new(format!("ws://{addr}/ws")),
        fast_policy(ReconnectMode::UntilFirstSuccess),
    );
    session.start();

    timeout(DEADLINE, session.run_until(|c| c.last_error().is_some()))
        .await
        .expect("connection refused");

    let client = session.client();
    assert!(!client.is_connected());
    assert!(client.manager().retry_pending());
    assert!(client.manager().failures() >= 1);
}

#[tokio::test]
async fn switching_endpoint_connects_to_new_source() {
    let first = start_bridge(&recording(&["from-first"]), false).await;
    let second = start_bridge(&recording(&["from-second"]), false).await;
    let mut session = Session::new(
        Handle::current(),
        first,
        fast_policy(ReconnectMode::UntilFirstSuccess),
    );
    session.start();
    timeout(DEADLINE, session.run_until(|c| c.records().len() == 1))
        .await
        .expect("first source");

    session.client_mut().clear();
    session.client_mut().set_endpoint(second.clone());
    timeout(DEADLINE, session.run_until(|c| c.records().len() == 1))
        .await
        .expect("second source");

    let client = session.client();
    assert_eq!(client.endpoint(), &second);
    assert_eq!(client.records()[0].name, "from-second");
    assert!(client.is_connected());
}
