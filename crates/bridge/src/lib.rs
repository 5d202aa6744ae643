pub mod demo;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use vizwire_protocol::{Recording, WsMessage};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("encoding record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Only upgrade requests for this path; others get a 404.
    pub path: String,
    /// Pause after each frame.
    pub interval: Duration,
    /// Close the socket once every record has been sent instead of waiting
    /// for the client to hang up.
    pub hang_up: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            interval: Duration::from_millis(50),
            hang_up: false,
        }
    }
}

/// A recording pre-encoded as `VizUpdate` text frames, shared by all
/// connections.
#[derive(Debug, Clone)]
pub struct Replay {
    frames: Arc<Vec<String>>,
}

impl Replay {
    pub fn new(recording: &Recording) -> Result<Self, BridgeError> {
        let frames = recording
            .vizs
            .iter()
            .map(|viz| WsMessage::VizUpdate(viz.clone()).to_json())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            frames: Arc::new(frames),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Pause after a failed accept, e.g. while the process is out of file
/// descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections forever, replaying to each one concurrently.
pub async fn serve(
    listener: TcpListener,
    replay: Replay,
    options: BridgeOptions,
) -> Result<(), BridgeError> {
    log::info!("bridge listening on {}", listener.local_addr()?);
    accept_loop(|| listener.accept(), replay, options).await;
    Ok(())
}

/// A failed accept is logged and retried; it never stops the loop.
async fn accept_loop<A, F>(mut accept: A, replay: Replay, options: BridgeOptions)
where
    A: FnMut() -> F,
    F: Future<Output = std::io::Result<(TcpStream, SocketAddr)>>,
{
    loop {
        let (stream, peer) = match accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("accept failed: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        log::info!("new connection from {peer}");
        let replay = replay.clone();
        let options = options.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &replay, &options).await {
                log::error!("connection {peer}: {e}");
            }
        });
    }
}

/// Accept and serve a single connection, then return.
pub async fn serve_one(
    listener: &TcpListener,
    replay: &Replay,
    options: &BridgeOptions,
) -> Result<(), BridgeError> {
    let (stream, peer) = listener.accept().await?;
    log::info!("new connection from {peer}");
    handle_connection(stream, replay, options).await
}

async fn handle_connection(
    stream: TcpStream,
    replay: &Replay,
    options: &BridgeOptions,
) -> Result<(), BridgeError> {
    let path = options.path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("not found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };
    let ws = accept_hdr_async(stream, check_path).await?;
    let (mut tx, mut rx) = ws.split();

    for frame in replay.frames.iter() {
        tx.send(Message::Text(frame.clone())).await?;
        tokio::time::sleep(options.interval).await;
    }
    log::info!("sent {} viz updates", replay.len());

    if options.hang_up {
        tx.send(Message::Close(None)).await?;
        return Ok(());
    }

    while let Some(message) = rx.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("peer went away: {e}");
                break;
            }
        }
    }
    log::info!("client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizwire_protocol::{Viz, decode_text};

    #[test]
    fn replay_encodes_every_record_in_order() {
        let mut recording = Recording::new("r", "s");
        recording.add_viz(Viz::new("one"));
        recording.add_viz(Viz::new("two"));
        let replay = Replay::new(&recording).unwrap();
        assert_eq!(replay.len(), 2);
        let names: Vec<String> = replay
            .frames
            .iter()
            .map(|f| decode_text(f).unwrap().name)
            .collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn rejects_other_paths() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let replay = Replay::new(&Recording::default()).unwrap();
        let server = tokio::spawn(async move {
            serve_one(&listener, &replay, &BridgeOptions::default()).await
        });

        let result = tokio_tungstenite::connect_async(format!("ws://{addr}/elsewhere")).await;
        assert!(result.is_err());
        assert!(server.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn keeps_accepting_after_accept_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut recording = Recording::new("r", "s");
        recording.add_viz(Viz::new("after-error"));
        let replay = Replay::new(&recording).unwrap();
        let options = BridgeOptions {
            interval: Duration::from_millis(1),
            hang_up: true,
            ..BridgeOptions::default()
        };

        tokio::spawn(async move {
            let mut failed = false;
            let accept = || {
                // EMFILE on the first call only.
                let fail = !failed;
                failed = true;
                let listener = &listener;
                async move {
                    if fail {
                        Err(std::io::Error::from_raw_os_error(24))
                    } else {
                        listener.accept().await
                    }
                }
            };
            accept_loop(accept, replay, options).await;
        });

        let received = tokio::time::timeout(Duration::from_secs(10), async {
            let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
                .await
                .unwrap();
            ws.next().await.unwrap().unwrap()
        })
        .await
        .unwrap();
        match received {
            Message::Text(text) => assert_eq!(decode_text(&text).unwrap().name, "after-error"),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}
