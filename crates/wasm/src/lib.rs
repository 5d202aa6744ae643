//! `VizClient` for the browser. Sockets and timers are the page's own; their
//! callbacks feed the shared client on the JS event loop.

mod logger;
mod shared;
mod timer;
mod transport;

use std::rc::Rc;

use log::info;
use vizwire_core::ClientConfig;
use wasm_bindgen::prelude::*;

use crate::shared::{Shared, WebClient};

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    logger::init(log::LevelFilter::Info);
}

/// The `ws` parameter of the page URL, if any.
fn query_endpoint() -> Option<String> {
    let search = web_sys::window()?.location().search().ok()?;
    web_sys::UrlSearchParams::new_with_str(&search)
        .ok()?
        .get("ws")
}

#[wasm_bindgen(js_name = VizClient)]
pub struct WebVizClient {
    shared: Rc<Shared>,
}

#[wasm_bindgen(js_class = VizClient)]
impl WebVizClient {
    /// Connects right away to `endpoint`, the page's `?ws=` parameter, or
    /// the default endpoint, in that order.
    #[wasm_bindgen(constructor)]
    pub fn new(endpoint: Option<String>) -> Self {
        Self::connect(&ClientConfig::default(), endpoint)
    }

    /// Like the constructor, with endpoint and retry settings from a TOML
    /// document.
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config: &str, endpoint: Option<String>) -> Result<Self, JsError> {
        let config = ClientConfig::from_toml_str(config).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(Self::connect(&config, endpoint))
    }

    fn connect(config: &ClientConfig, endpoint: Option<String>) -> Self {
        let explicit = endpoint.or_else(query_endpoint);
        let endpoint = config.resolve_endpoint(explicit.as_deref());
        info!("connecting to {endpoint}");
        let shared = Shared::new(endpoint, config.retry.clone());
        shared.update(WebClient::start);
        Self { shared }
    }

    #[wasm_bindgen(getter, js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.shared.read(WebClient::is_connected)
    }

    #[wasm_bindgen(getter, js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .read(|client| client.last_error().map(str::to_string))
    }

    #[wasm_bindgen(getter)]
    pub fn endpoint(&self) -> String {
        self.shared.read(|client| client.endpoint().to_string())
    }

    /// `"connecting"`, `"connected"` and so on.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.shared
            .read(|client| client.manager().state().to_string())
    }

    #[wasm_bindgen(getter, js_name = recordCount)]
    pub fn record_count(&self) -> usize {
        self.shared.read(|client| client.records().len())
    }

    /// Every record so far as a JSON array.
    pub fn records(&self) -> Result<String, JsError> {
        self.shared
            .read(|client| serde_json::to_string(client.records()))
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// One record as JSON, or `undefined` past the end.
    pub fn record(&self, index: usize) -> Result<Option<String>, JsError> {
        self.shared
            .read(|client| client.get(index).map(serde_json::to_string).transpose())
            .map_err(|e| JsError::new(&e.to_string()))
    }

    pub fn clear(&self) {
        self.shared.update(WebClient::clear);
    }

    #[wasm_bindgen(js_name = setEndpoint)]
    pub fn set_endpoint(&self, url: &str) {
        let endpoint = vizwire_core::Endpoint::resolve(Some(url));
        self.shared.update(|client| client.set_endpoint(endpoint));
    }

    pub fn reconnect(&self) {
        self.shared.update(WebClient::reconnect);
    }

    /// `callback` runs with no arguments after anything observable changes.
    /// Pass nothing to unregister.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: Option<js_sys::Function>) {
        self.shared.set_listener(callback);
    }

    /// Close the socket and stop retrying. Records stay readable.
    pub fn dispose(&self) {
        self.shared.set_listener(None);
        self.shared.update(WebClient::teardown);
    }
}
