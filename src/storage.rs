//! Key-value storage behind the preferences
//!
//! Two modes, chosen once when the adapter is built:
//! - Standalone: values live in a persistent string store (LocalStorage on
//!   web, an in-process map natively).
//! - Host-managed: an embedding host (the editor extension) owns persistence,
//!   so every read reports absent and every write is dropped.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::StorageError;

/// A flat string key-value store
pub trait KeyValueStore {
    /// Stored value for `key`, or `None` when absent
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, overwriting any prior entry
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Drop the entry for `key` (absent keys are fine)
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Which backend the adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// An embedding host owns the settings; never read or write
    HostManaged,
    /// Persist to the platform store
    #[default]
    Standalone,
}

impl StorageMode {
    /// Mode for an injected `host_managed` flag
    pub fn from_host_managed(host_managed: bool) -> Self {
        if host_managed {
            StorageMode::HostManaged
        } else {
            StorageMode::Standalone
        }
    }

    pub fn is_host_managed(&self) -> bool {
        *self == StorageMode::HostManaged
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::HostManaged => "host-managed",
            StorageMode::Standalone => "standalone",
        }
    }

    /// Probe for the host marker object (`window.vsCodeApi`)
    #[cfg(target_arch = "wasm32")]
    pub fn detect() -> Self {
        const HOST_MARKER: &str = "vsCodeApi";

        let key = wasm_bindgen::JsValue::from_str(HOST_MARKER);
        let present = web_sys::window()
            .and_then(|w| js_sys::Reflect::get(&w, &key).ok())
            .map(|marker| marker.is_truthy())
            .unwrap_or(false);

        Self::from_host_managed(present)
    }

    /// Native builds are never embedded
    #[cfg(not(target_arch = "wasm32"))]
    pub fn detect() -> Self {
        StorageMode::Standalone
    }
}

/// Backend used in host-managed mode
#[derive(Debug, Clone, Copy, Default)]
pub struct HostManagedStorage;

impl KeyValueStore for HostManagedStorage {
    fn get_item(&self, _key: &str) -> Option<String> {
        None
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// A write observed by [`MemoryStorage`] (`None` value means removal)
pub type WriteRecord = (String, Option<String>);

#[derive(Debug, Default)]
struct MemoryInner {
    entries: BTreeMap<String, String>,
    writes: Vec<WriteRecord>,
    reads: usize,
    failing: bool,
}

/// In-process string store
///
/// Clones share the same entries, so a clone kept aside can inspect what an
/// adapter wrote. Every write and removal is recorded in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from key/value pairs without recording writes
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let storage = Self::new();
        storage.inner.borrow_mut().entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        storage
    }

    /// Writes and removals issued so far
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.inner.borrow().writes.clone()
    }

    /// Writes and removals issued for one key
    pub fn writes_for(&self, key: &str) -> Vec<WriteRecord> {
        self.inner
            .borrow()
            .writes
            .iter()
            .filter(|(k, _)| k == key)
            .cloned()
            .collect()
    }

    /// Number of `get_item` calls served
    pub fn reads(&self) -> usize {
        self.inner.borrow().reads
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Make every subsequent write fail (simulates a full or revoked store)
    pub fn set_failing(&self, failing: bool) {
        self.inner.borrow_mut().failing = failing;
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        inner.reads += 1;
        inner.entries.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.failing {
            return Err(StorageError::Backend("write rejected".to_string()));
        }
        inner.entries.insert(key.to_string(), value.to_string());
        inner.writes.push((key.to_string(), Some(value.to_string())));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.borrow_mut();
        if inner.failing {
            return Err(StorageError::Backend("remove rejected".to_string()));
        }
        inner.entries.remove(key);
        inner.writes.push((key.to_string(), None));
        Ok(())
    }
}

/// `window.localStorage`
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Default)]
pub struct BrowserStorage {
    storage: Option<web_sys::Storage>,
}

#[cfg(target_arch = "wasm32")]
impl BrowserStorage {
    pub fn new() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if storage.is_none() {
            log::warn!("LocalStorage unavailable, settings will not persist");
        }
        Self { storage }
    }

    fn storage(&self) -> Result<&web_sys::Storage, StorageError> {
        self.storage.as_ref().ok_or(StorageError::Unavailable)
    }
}

#[cfg(target_arch = "wasm32")]
fn js_error(err: wasm_bindgen::JsValue) -> StorageError {
    StorageError::Backend(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for BrowserStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?.set_item(key, value).map_err(js_error)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.storage()?.remove_item(key).map_err(js_error)
    }
}

/// Resolves the backend once and fronts it for the preferences
pub struct StorageAdapter {
    mode: StorageMode,
    backend: Box<dyn KeyValueStore>,
}

impl StorageAdapter {
    /// Adapter over the platform's default backend for `mode`
    pub fn new(mode: StorageMode) -> Self {
        let backend: Box<dyn KeyValueStore> = match mode {
            StorageMode::HostManaged => Box::new(HostManagedStorage),
            StorageMode::Standalone => Self::platform_backend(),
        };
        log::info!("Settings storage mode: {}", mode.as_str());
        Self { mode, backend }
    }

    /// Adapter over a caller-supplied backend
    ///
    /// In host-managed mode the backend is never touched.
    pub fn with_backend(mode: StorageMode, backend: impl KeyValueStore + 'static) -> Self {
        log::info!("Settings storage mode: {} (custom backend)", mode.as_str());
        Self {
            mode,
            backend: Box::new(backend),
        }
    }

    /// Standalone adapter over a caller-supplied backend
    pub fn standalone(backend: impl KeyValueStore + 'static) -> Self {
        Self::with_backend(StorageMode::Standalone, backend)
    }

    /// Host-managed adapter
    pub fn host_managed() -> Self {
        Self::new(StorageMode::HostManaged)
    }

    #[cfg(target_arch = "wasm32")]
    fn platform_backend() -> Box<dyn KeyValueStore> {
        Box::new(BrowserStorage::new())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn platform_backend() -> Box<dyn KeyValueStore> {
        Box::new(MemoryStorage::new())
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Stored string for `key`, `None` when absent (always `None` when host-managed)
    pub fn get(&self, key: &str) -> Option<String> {
        if self.mode.is_host_managed() {
            return None;
        }
        self.backend.get_item(key)
    }

    /// Store `value` under `key`; failures are logged and dropped
    pub fn set(&self, key: &str, value: &str) {
        if self.mode.is_host_managed() {
            return;
        }
        match self.backend.set_item(key, value) {
            Ok(()) => log::debug!("Persisted setting {} = {}", key, value),
            Err(e) => log::warn!("Failed to persist setting {}: {}", key, e),
        }
    }

    /// Drop the entry for `key`; failures are logged and dropped
    pub fn remove(&self, key: &str) {
        if self.mode.is_host_managed() {
            return;
        }
        match self.backend.remove_item(key) {
            Ok(()) => log::debug!("Cleared setting {}", key),
            Err(e) => log::warn!("Failed to clear setting {}: {}", key, e),
        }
    }
}

impl std::fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAdapter")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_get_set() {
        let memory = MemoryStorage::new();
        let adapter = StorageAdapter::standalone(memory.clone());

        assert_eq!(adapter.get("theme"), None);
        adapter.set("theme", "dark");
        assert_eq!(adapter.get("theme"), Some("dark".to_string()));

        adapter.set("theme", "classic");
        assert_eq!(adapter.get("theme"), Some("classic".to_string()));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_host_managed_never_touches_backend() {
        let memory = MemoryStorage::with_entries([("theme", "dark")]);
        let adapter = StorageAdapter::with_backend(StorageMode::HostManaged, memory.clone());

        assert_eq!(adapter.get("theme"), None);
        adapter.set("theme", "classic");
        adapter.remove("theme");

        assert_eq!(memory.reads(), 0);
        assert!(memory.writes().is_empty());
        assert_eq!(memory.get_item("theme"), Some("dark".to_string()));
    }

    #[test]
    fn test_failed_writes_are_swallowed() {
        let memory = MemoryStorage::with_entries([("language", "en-GB")]);
        memory.set_failing(true);
        let adapter = StorageAdapter::standalone(memory.clone());

        adapter.set("language", "de-DE");
        adapter.remove("language");

        assert_eq!(adapter.get("language"), Some("en-GB".to_string()));
        assert!(memory.writes().is_empty());
    }

    #[test]
    fn test_remove_records_write() {
        let memory = MemoryStorage::with_entries([("gistToken", "abc")]);
        let adapter = StorageAdapter::standalone(memory.clone());

        adapter.remove("gistToken");

        assert_eq!(adapter.get("gistToken"), None);
        assert_eq!(memory.writes(), vec![("gistToken".to_string(), None)]);
    }

    #[test]
    fn test_mode_flag() {
        assert_eq!(StorageMode::from_host_managed(true), StorageMode::HostManaged);
        assert_eq!(StorageMode::from_host_managed(false), StorageMode::Standalone);
        assert_eq!(StorageMode::detect(), StorageMode::Standalone);
        assert_eq!(StorageAdapter::host_managed().mode(), StorageMode::HostManaged);
    }
}
