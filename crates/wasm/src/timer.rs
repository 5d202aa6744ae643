use std::rc::Weak;
use std::time::Duration;

use log::error;
use vizwire_core::{AttemptId, ConnectionEvent, RetryScheduler};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::shared::{Shared, describe_js};

/// Retry timer on `window.setTimeout`.
pub struct TimeoutScheduler {
    shared: Weak<Shared>,
    pending: Option<PendingTimeout>,
}

struct PendingTimeout {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl TimeoutScheduler {
    pub fn new(shared: Weak<Shared>) -> Self {
        Self {
            shared,
            pending: None,
        }
    }

    /// Queued behind the transition that asked for the retry, so the
    /// client does not wait on a timer that will never fire.
    fn unavailable(&self, after: AttemptId, message: String) {
        error!("retry after {after} not scheduled: {message}");
        Shared::post(
            &self.shared,
            ConnectionEvent::RetryUnavailable { after, message },
        );
    }
}

impl RetryScheduler for TimeoutScheduler {
    fn schedule(&mut self, after: AttemptId, delay: Duration) {
        self.cancel();
        let Some(window) = web_sys::window() else {
            self.unavailable(after, "no window to run the retry timer".to_string());
            return;
        };

        let shared = self.shared.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            Shared::post(&shared, ConnectionEvent::RetryElapsed { after });
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            millis,
        ) {
            Ok(handle) => {
                self.pending = Some(PendingTimeout {
                    handle,
                    _callback: callback,
                });
            }
            Err(err) => self.unavailable(after, format!("setTimeout failed: {}", describe_js(&err))),
        }
    }

    fn cancel(&mut self) {
        if let Some(pending) = self.pending.take()
            && let Some(window) = web_sys::window()
        {
            window.clear_timeout_with_handle(pending.handle);
        }
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
