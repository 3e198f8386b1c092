//! User-facing named signal registry.
//!
//! Distinct from the receive history: this is an append/remove list keyed by
//! unique names, persisted through the key-value store under `count` plus
//! per-index `sig_<i>_{name,addr,key,time}` entries. Removal by index shifts
//! subsequent entries down by one (O(n), like the flat flash layout it
//! mirrors).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;
use crate::signal::RemoteSignal;
use crate::store::KvStore;

const KEY_COUNT: &str = "count";

/// One named entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSignal {
    pub name: String,
    pub signal: RemoteSignal,
    pub captured_at: DateTime<Utc>,
}

pub struct SignalRegistry {
    entries: Vec<StoredSignal>,
    capacity: usize,
    store: Box<dyn KvStore>,
}

impl SignalRegistry {
    /// Open the registry, loading persisted entries (at most `capacity`).
    pub fn open(capacity: usize, store: Box<dyn KvStore>) -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            store,
        };
        registry.load();
        registry
    }

    fn load(&mut self) {
        let saved = self.store.get_u64(KEY_COUNT).unwrap_or(0) as usize;
        let saved = saved.min(self.capacity);

        for i in 0..saved {
            let prefix = format!("sig_{i}_");
            let name = self.store.get_str(&format!("{prefix}name")).unwrap_or_default();
            let addr = self.store.get_str(&format!("{prefix}addr")).unwrap_or_default();
            let key = self.store.get_str(&format!("{prefix}key")).unwrap_or_default();
            if name.is_empty() || addr.is_empty() || key.is_empty() {
                continue;
            }
            let time = self.store.get_u64(&format!("{prefix}time")).unwrap_or(0);
            let captured_at = DateTime::from_timestamp(time as i64, 0).unwrap_or_else(Utc::now);

            self.entries.push(StoredSignal {
                name,
                signal: RemoteSignal::new(
                    addr,
                    key,
                    crate::signal::Band::Mhz433,
                    crate::protocol::DEFAULT_PROTOCOL,
                    crate::protocol::DEFAULT_PULSE_US,
                ),
                captured_at,
            });
        }
        if !self.entries.is_empty() {
            tracing::info!(count = self.entries.len(), "loaded signal registry");
        }
    }

    fn save(&mut self) {
        self.store.set_u64(KEY_COUNT, self.entries.len() as u64);
        for (i, entry) in self.entries.iter().enumerate() {
            let prefix = format!("sig_{i}_");
            self.store.set_str(&format!("{prefix}name"), &entry.name);
            self.store.set_str(&format!("{prefix}addr"), &entry.signal.address);
            self.store.set_str(&format!("{prefix}key"), &entry.signal.key);
            self.store
                .set_u64(&format!("{prefix}time"), entry.captured_at.timestamp() as u64);
        }
    }

    /// Add a named signal. An existing name updates that entry in place.
    pub fn add_named(&mut self, name: &str, signal: RemoteSignal) -> Result<(), DeviceError> {
        if !signal.is_valid() {
            return Err(DeviceError::InvalidSignal);
        }

        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            existing.signal = signal;
            existing.captured_at = Utc::now();
            self.save();
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            return Err(DeviceError::RegistryFull {
                capacity: self.capacity,
            });
        }

        self.entries.push(StoredSignal {
            name: name.to_owned(),
            signal,
            captured_at: Utc::now(),
        });
        self.save();
        Ok(())
    }

    /// Add with an auto-generated `Signal_<n>` name; returns the name used.
    pub fn add_auto(&mut self, signal: RemoteSignal) -> Result<String, DeviceError> {
        let name = format!("Signal_{}", self.entries.len() + 1);
        self.add_named(&name, signal)?;
        Ok(name)
    }

    /// Replace name and signal at `index`.
    pub fn update(
        &mut self,
        index: usize,
        name: &str,
        signal: RemoteSignal,
    ) -> Result<(), DeviceError> {
        if !signal.is_valid() {
            return Err(DeviceError::InvalidSignal);
        }
        let count = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(DeviceError::InvalidIndex { index, count })?;
        entry.name = name.to_owned();
        entry.signal = signal;
        entry.captured_at = Utc::now();
        self.save();
        Ok(())
    }

    /// Remove by index; later entries shift down one position.
    pub fn remove(&mut self, index: usize) -> Result<StoredSignal, DeviceError> {
        if index >= self.entries.len() {
            return Err(DeviceError::InvalidIndex {
                index,
                count: self.entries.len(),
            });
        }
        let removed = self.entries.remove(index);
        self.save();
        Ok(removed)
    }

    /// Remove by name.
    pub fn remove_named(&mut self, name: &str) -> Result<StoredSignal, DeviceError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| DeviceError::UnknownName {
                name: name.to_owned(),
            })?;
        self.remove(index)
    }

    pub fn get(&self, index: usize) -> Option<&StoredSignal> {
        self.entries.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&StoredSignal> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredSignal> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove everything and wipe the persisted namespace.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.store.clear();
    }
}
