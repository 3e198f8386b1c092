//! Management API surface.
//!
//! The HTTP/JSON routing itself is an external collaborator; it parses the
//! query string and calls [`ManagementApi::handle`] with an [`ApiRequest`],
//! then serializes the returned [`ApiResponse`] envelope. Actions and the
//! `{code, message, data?}` envelope match the device's established wire
//! contract.

use serde::Serialize;
use serde_json::{json, Value};

use crate::core::SharedTransceiver;
use crate::registry::SignalRegistry;
use crate::signal::{Band, RemoteSignal};
use crate::store::KvStore;

const KEY_BOOT_INDEX: &str = "boot_index";

/// Recognized management actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Send,
    Delete,
    Add,
    Capture,
    BindBoot,
    UnbindBoot,
    GetBootBinding,
    ClearAll,
}

impl Action {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "list" => Action::List,
            "send" => Action::Send,
            "delete" => Action::Delete,
            "add" => Action::Add,
            "capture" => Action::Capture,
            "bind_boot" => Action::BindBoot,
            "unbind_boot" => Action::UnbindBoot,
            "get_boot_binding" => Action::GetBootBinding,
            "clear_all" => Action::ClearAll,
            _ => return None,
        })
    }
}

/// Decoded request parameters.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub action: String,
    pub index: Option<usize>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub key: Option<String>,
}

/// JSON response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: None,
        }
    }

    pub fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Dispatcher for management actions against the registry and the core.
pub struct ManagementApi {
    registry: SignalRegistry,
    core: SharedTransceiver,
    store: Box<dyn KvStore>,
    boot_index: Option<usize>,
}

impl ManagementApi {
    pub fn new(
        registry: SignalRegistry,
        core: SharedTransceiver,
        store: Box<dyn KvStore>,
    ) -> Self {
        let boot_index = store
            .get_u64(KEY_BOOT_INDEX)
            .map(|v| v as usize)
            .filter(|&i| i < registry.len());
        Self {
            registry,
            core,
            store,
            boot_index,
        }
    }

    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    pub fn boot_binding(&self) -> Option<usize> {
        self.boot_index
    }

    /// Handle one management request.
    pub fn handle(&mut self, request: &ApiRequest) -> ApiResponse {
        let Some(action) = Action::parse(&request.action) else {
            return ApiResponse::error(400, format!("unknown action: {}", request.action));
        };

        match action {
            Action::List => self.list(),
            Action::Send => match request.index {
                Some(index) => self.send_index(index),
                None => ApiResponse::error(400, "missing index parameter"),
            },
            Action::Delete => match request.index {
                Some(index) => self.delete(index),
                None => ApiResponse::error(400, "missing index parameter"),
            },
            Action::Add => self.add(request),
            Action::Capture => {
                self.core.lock().start_capture();
                ApiResponse::ok("capture armed, press the remote button")
            }
            Action::BindBoot => match request.index {
                Some(index) => self.bind_boot(index),
                None => ApiResponse::error(400, "missing index parameter"),
            },
            Action::UnbindBoot => {
                self.set_boot_binding(None);
                ApiResponse::ok("boot button unbound")
            }
            Action::GetBootBinding => ApiResponse::ok_with(
                "ok",
                json!(self.boot_index.map(|i| i as i64).unwrap_or(-1)),
            ),
            Action::ClearAll => {
                self.registry.clear();
                self.set_boot_binding(None);
                ApiResponse::ok("all signals cleared")
            }
        }
    }

    fn list(&self) -> ApiResponse {
        let items: Vec<Value> = self
            .registry
            .iter()
            .map(|entry| {
                json!({
                    "name": entry.name,
                    "address": entry.signal.address,
                    "key": entry.signal.key,
                    "band": entry.signal.band,
                })
            })
            .collect();
        ApiResponse::ok_with("ok", Value::Array(items))
    }

    /// Send the signal stored at `index`. The core handles receive
    /// suppression around the transmission.
    pub fn send_index(&mut self, index: usize) -> ApiResponse {
        let Some(entry) = self.registry.get(index) else {
            return ApiResponse::error(400, "send failed: invalid index");
        };
        let signal = entry.signal.clone();
        self.core.lock().send(&signal);
        ApiResponse::ok("signal sent")
    }

    /// Send the boot-bound signal, or fall back to `fallback_index`.
    pub fn send_bound_or(&mut self, fallback_index: usize) -> ApiResponse {
        let index = self.boot_index.unwrap_or(fallback_index);
        self.send_index(index)
    }

    fn delete(&mut self, index: usize) -> ApiResponse {
        match self.registry.remove(index) {
            Ok(removed) => {
                // Keep the binding pointing at the same entry (or drop it).
                match self.boot_index {
                    Some(bound) if bound == index => self.set_boot_binding(None),
                    Some(bound) if bound > index => self.set_boot_binding(Some(bound - 1)),
                    _ => {}
                }
                ApiResponse::ok(format!("deleted {}", removed.name))
            }
            Err(e) => ApiResponse::error(400, format!("delete failed: {e}")),
        }
    }

    fn add(&mut self, request: &ApiRequest) -> ApiResponse {
        let (Some(name), Some(address), Some(key)) =
            (&request.name, &request.address, &request.key)
        else {
            return ApiResponse::error(400, "missing name/address/key parameter");
        };

        let signal = RemoteSignal::new(
            address.clone(),
            key.clone(),
            Band::Mhz433,
            crate::protocol::DEFAULT_PROTOCOL,
            crate::protocol::DEFAULT_PULSE_US,
        );
        match self.registry.add_named(name, signal) {
            Ok(()) => ApiResponse::ok("signal added"),
            Err(e) => ApiResponse::error(400, format!("add failed: {e}")),
        }
    }

    fn bind_boot(&mut self, index: usize) -> ApiResponse {
        if index >= self.registry.len() {
            return ApiResponse::error(400, "bind failed: invalid index");
        }
        self.set_boot_binding(Some(index));
        tracing::info!(index, "boot button bound");
        ApiResponse::ok("boot button bound")
    }

    fn set_boot_binding(&mut self, index: Option<usize>) {
        self.boot_index = index;
        match index {
            Some(i) => self.store.set_u64(KEY_BOOT_INDEX, i as u64),
            None => self.store.remove(KEY_BOOT_INDEX),
        }
    }

    /// Store the currently captured signal into the registry under `name`
    /// (or an auto-generated name).
    pub fn save_captured(&mut self, name: Option<&str>) -> ApiResponse {
        let captured = self.core.lock().captured_signal();
        let Some(signal) = captured else {
            return ApiResponse::error(404, "no captured signal");
        };
        let result = match name {
            Some(name) => self.registry.add_named(name, signal).map(|()| name.to_owned()),
            None => self.registry.add_auto(signal),
        };
        match result {
            Ok(name) => ApiResponse::ok(format!("captured signal saved as {name}")),
            Err(e) => ApiResponse::error(400, format!("save failed: {e}")),
        }
    }
}
