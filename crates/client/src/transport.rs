use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use vizwire_core::{AttemptId, ConnectionEvent, Endpoint, Transport, TransportError};
use vizwire_protocol::Frame;

struct ActiveSocket {
    attempt: AttemptId,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// WebSocket transport running each socket as a tokio task.
///
/// Socket activity is posted to `events`; the task itself never touches
/// client state.
pub struct TokioTransport {
    runtime: Handle,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    active: Option<ActiveSocket>,
}

impl TokioTransport {
    pub fn new(runtime: Handle, events: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self {
            runtime,
            events,
            active: None,
        }
    }

    pub fn active_attempt(&self) -> Option<AttemptId> {
        self.active.as_ref().map(|socket| socket.attempt)
    }

    fn shut_down_active(&mut self) {
        if let Some(socket) = self.active.take() {
            // The task closes the socket gracefully; if it already finished
            // the send fails and there is nothing to do.
            if socket.shutdown.send(()).is_err() {
                socket.task.abort();
            }
        }
    }
}

impl Transport for TokioTransport {
    fn open(&mut self, attempt: AttemptId, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.shut_down_active();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = self.runtime.spawn(run_socket(
            attempt,
            endpoint.to_string(),
            self.events.clone(),
            shutdown_rx,
        ));
        self.active = Some(ActiveSocket {
            attempt,
            shutdown,
            task,
        });
        Ok(())
    }

    fn close(&mut self, attempt: AttemptId) {
        if self.active_attempt() == Some(attempt) {
            self.shut_down_active();
        }
    }
}

impl Drop for TokioTransport {
    fn drop(&mut self) {
        self.shut_down_active();
    }
}

fn describe_close(frame: Option<CloseFrame<'_>>) -> Option<String> {
    let frame = frame?;
    let code = u16::from(frame.code);
    if frame.reason.is_empty() {
        Some(format!("closed by server ({code})"))
    } else {
        Some(format!("closed by server ({code}): {}", frame.reason))
    }
}

async fn run_socket(
    attempt: AttemptId,
    url: String,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let connect = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = &mut shutdown => return,
    };
    let mut stream = match connect {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let _ = events.send(ConnectionEvent::TransportError {
                attempt,
                message: e.to_string(),
            });
            return;
        }
    };
    let _ = events.send(ConnectionEvent::Opened { attempt });

    loop {
        let message = tokio::select! {
            message = stream.next() => message,
            _ = &mut shutdown => {
                if let Err(e) = stream.close(None).await {
                    log::debug!("closing {url}: {e}");
                }
                return;
            }
        };

        let event = match message {
            Some(Ok(Message::Text(text))) => ConnectionEvent::Frame {
                attempt,
                frame: Frame::Text(text),
            },
            Some(Ok(Message::Binary(bytes))) => ConnectionEvent::Frame {
                attempt,
                frame: Frame::Binary(bytes),
            },
            Some(Ok(Message::Close(frame))) => {
                let _ = events.send(ConnectionEvent::Closed {
                    attempt,
                    reason: describe_close(frame),
                });
                return;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                let _ = events.send(ConnectionEvent::TransportError {
                    attempt,
                    message: e.to_string(),
                });
                return;
            }
            None => {
                let _ = events.send(ConnectionEvent::Closed {
                    attempt,
                    reason: None,
                });
                return;
            }
        };
        if events.send(event).is_err() {
            // Client is gone.
            return;
        }
    }
}
