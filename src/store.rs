//! Namespaced key-value persistence.
//!
//! Models the flash preferences store the device firmware writes through: a
//! namespace holds flat typed keys (`captured`, `address`, `sig_0_name`, …).
//! The file-backed implementation keeps one JSON object per namespace under
//! the config directory and writes through on every mutation. Persistence
//! failures are logged, never fatal; the control loop stays available.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

/// A namespaced key-value store.
pub trait KvStore: Send {
    fn get_str(&self, key: &str) -> Option<String>;
    fn set_str(&mut self, key: &str, value: &str);
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn set_bool(&mut self, key: &str, value: bool);
    fn get_u64(&self, key: &str) -> Option<u64>;
    fn set_u64(&mut self, key: &str, value: u64);
    fn remove(&mut self, key: &str);
    /// Drop every key in the namespace.
    fn clear(&mut self);
}

/// JSON-file-backed store: one `<namespace>.json` per namespace.
pub struct FileStore {
    path: PathBuf,
    map: BTreeMap<String, Value>,
}

impl FileStore {
    /// Open (or create) the namespace file under `dir`.
    pub fn open(dir: &Path, namespace: &str) -> Result<Self> {
        let path = dir.join(format!("{namespace}.json"));
        let map = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read store {path:?}"))?;
            match serde_json::from_str(&text) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(?path, error = %e, "store file corrupt, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, map })
    }

    fn persist(&self) {
        let text = match serde_json::to_string_pretty(&self.map) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "store serialization failed");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, text) {
            tracing::warn!(path = ?self.path, error = %e, "store write failed");
        }
    }
}

impl KvStore for FileStore {
    fn get_str(&self, key: &str) -> Option<String> {
        self.map.get(key)?.as_str().map(str::to_owned)
    }

    fn set_str(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_owned(), Value::from(value));
        self.persist();
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key)?.as_bool()
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.map.insert(key.to_owned(), Value::from(value));
        self.persist();
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.map.get(key)?.as_u64()
    }

    fn set_u64(&mut self, key: &str, value: u64) {
        self.map.insert(key.to_owned(), Value::from(value));
        self.persist();
    }

    fn remove(&mut self, key: &str) {
        if self.map.remove(key).is_some() {
            self.persist();
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.persist();
    }
}

/// In-memory store for tests and demo mode without a writable config dir.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get_str(&self, key: &str) -> Option<String> {
        self.map.get(key)?.as_str().map(str::to_owned)
    }

    fn set_str(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_owned(), Value::from(value));
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key)?.as_bool()
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.map.insert(key.to_owned(), Value::from(value));
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.map.get(key)?.as_u64()
    }

    fn set_u64(&mut self, key: &str, value: u64) {
        self.map.insert(key.to_owned(), Value::from(value));
    }

    fn remove(&mut self, key: &str) {
        self.map.remove(key);
    }

    fn clear(&mut self) {
        self.map.clear();
    }
}
