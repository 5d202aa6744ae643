use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use log::warn;
use vizwire_core::{
    ConnectionEvent, ConnectionState, Endpoint, RetryPolicy, RetryScheduler, Transport, VizClient,
};
use wasm_bindgen::JsValue;

use crate::timer::TimeoutScheduler;
use crate::transport::WebSocketTransport;

pub type WebClient = VizClient<WebSocketTransport, TimeoutScheduler>;

/// What a change listener can observe. A listener fires when any of it
/// differs after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    revision: u64,
    state: ConnectionState,
    last_error: Option<String>,
    endpoint: String,
}

impl Snapshot {
    pub fn of<T: Transport, S: RetryScheduler>(client: &VizClient<T, S>) -> Self {
        Self {
            revision: client.store().revision(),
            state: client.manager().state(),
            last_error: client.last_error().map(str::to_string),
            endpoint: client.endpoint().to_string(),
        }
    }
}

/// Client state shared between the JS handle and the socket and timer
/// callbacks. Callbacks hold a [`Weak`] and post events; events are handled
/// one at a time in arrival order.
pub struct Shared {
    client: RefCell<WebClient>,
    queue: RefCell<VecDeque<ConnectionEvent>>,
    listener: RefCell<Option<js_sys::Function>>,
}

impl Shared {
    pub fn new(endpoint: Endpoint, policy: RetryPolicy) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Self>| Self {
            client: RefCell::new(VizClient::new(
                endpoint,
                policy,
                WebSocketTransport::new(weak.clone()),
                TimeoutScheduler::new(weak.clone()),
            )),
            queue: RefCell::new(VecDeque::new()),
            listener: RefCell::new(None),
        })
    }

    /// Queue `event` and handle it unless the client is already busy, in
    /// which case the running pump picks it up.
    pub fn post(shared: &Weak<Self>, event: ConnectionEvent) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        shared.queue.borrow_mut().push_back(event);
        shared.pump();
    }

    pub fn read<R>(&self, f: impl FnOnce(&WebClient) -> R) -> R {
        f(&self.client.borrow())
    }

    pub fn update(&self, f: impl FnOnce(&mut WebClient)) {
        let Ok(mut client) = self.client.try_borrow_mut() else {
            warn!("client is busy; dropping re-entrant call");
            return;
        };
        let before = Snapshot::of(&client);
        f(&mut client);
        let changed = Snapshot::of(&client) != before;
        drop(client);
        if changed {
            self.notify();
        }
        self.pump();
    }

    pub fn set_listener(&self, listener: Option<js_sys::Function>) {
        *self.listener.borrow_mut() = listener;
    }

    fn pump(&self) {
        loop {
            let Ok(mut client) = self.client.try_borrow_mut() else {
                return;
            };
            let Some(event) = self.queue.borrow_mut().pop_front() else {
                return;
            };
            let before = Snapshot::of(&client);
            client.handle(event);
            let changed = Snapshot::of(&client) != before;
            // The listener reads the client back.
            drop(client);
            if changed {
                self.notify();
            }
        }
    }

    fn notify(&self) {
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener
            && let Err(err) = listener.call0(&JsValue::NULL)
        {
            warn!("change listener threw: {}", describe_js(&err));
        }
    }
}

pub fn describe_js(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = wasm_bindgen::JsCast::dyn_ref::<js_sys::Error>(value) {
        return String::from(error.message());
    }
    format!("{value:?}")
}
