use std::rc::Weak;

use log::{debug, warn};
use vizwire_core::{AttemptId, ConnectionEvent, Endpoint, Transport, TransportError};
use vizwire_protocol::Frame;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{BinaryType, CloseEvent, Event, MessageEvent, WebSocket};

use crate::shared::{Shared, describe_js};

/// Browser `WebSocket` transport. At most one socket is open; its handlers
/// are detached before it is closed so a released attempt reports nothing.
pub struct WebSocketTransport {
    shared: Weak<Shared>,
    active: Option<ActiveSocket>,
}

struct ActiveSocket {
    attempt: AttemptId,
    socket: WebSocket,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl ActiveSocket {
    fn shut(self) {
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onerror(None);
        self.socket.set_onclose(None);
        if let Err(err) = self.socket.close() {
            debug!("closing {}: {}", self.attempt, describe_js(&err));
        }
    }
}

impl WebSocketTransport {
    pub fn new(shared: Weak<Shared>) -> Self {
        Self {
            shared,
            active: None,
        }
    }

    fn shut_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.shut();
        }
    }
}

fn message_frame(event: &MessageEvent) -> Option<Frame> {
    let data = event.data();
    if let Some(text) = data.as_string() {
        return Some(Frame::Text(text));
    }
    let buffer = data.dyn_into::<js_sys::ArrayBuffer>().ok()?;
    Some(Frame::Binary(js_sys::Uint8Array::new(&buffer).to_vec()))
}

fn describe_close(event: &CloseEvent) -> String {
    let (code, reason) = (event.code(), event.reason());
    if reason.is_empty() {
        format!("closed by server ({code})")
    } else {
        format!("closed by server ({code}): {reason}")
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, attempt: AttemptId, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.shut_active();

        let socket =
            WebSocket::new(endpoint.as_str()).map_err(|err| TransportError(describe_js(&err)))?;
        socket.set_binary_type(BinaryType::Arraybuffer);

        let shared = self.shared.clone();
        let on_open = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            Shared::post(&shared, ConnectionEvent::Opened { attempt });
        });

        let shared = self.shared.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            match message_frame(&event) {
                Some(frame) => Shared::post(&shared, ConnectionEvent::Frame { attempt, frame }),
                None => warn!("ignoring message with unsupported payload on {attempt}"),
            }
        });

        // Browsers hide the cause of socket errors from scripts.
        let shared = self.shared.clone();
        let url = endpoint.to_string();
        let on_error = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            Shared::post(
                &shared,
                ConnectionEvent::TransportError {
                    attempt,
                    message: format!("WebSocket error on {url}"),
                },
            );
        });

        let shared = self.shared.clone();
        let on_close = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            Shared::post(
                &shared,
                ConnectionEvent::Closed {
                    attempt,
                    reason: Some(describe_close(&event)),
                },
            );
        });

        socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        self.active = Some(ActiveSocket {
            attempt,
            socket,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
        });
        Ok(())
    }

    fn close(&mut self, attempt: AttemptId) {
        if self.active.as_ref().is_some_and(|active| active.attempt == attempt) {
            self.shut_active();
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.shut_active();
    }
}
