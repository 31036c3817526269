//! Editor settings - persisted, observable user preferences
//!
//! Core modules:
//! - `storage`: Key-value backends (LocalStorage on web, host-managed no-op)
//! - `observable`: Values that notify subscribers on change
//! - `preference`: One typed preference with its storage coercion
//! - `settings`: The full preference set and `apply()` into the host
//! - `host`: Setters the host application exposes
//! - `web`: wasm-bindgen entry points (wasm32 only)

pub mod error;
pub mod host;
pub mod observable;
pub mod preference;
pub mod settings;
pub mod storage;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use error::{ApplyError, HostError, SettingsError, StorageError};
pub use host::{GistCredentials, HostApp, Workspace};
pub use observable::{Observable, SubscriptionId};
pub use preference::{Persistence, Preference, PreferenceValue};
pub use settings::{Settings, SettingsPatch, SettingsSnapshot};
pub use storage::{HostManagedStorage, KeyValueStore, MemoryStorage, StorageAdapter, StorageMode};

#[cfg(target_arch = "wasm32")]
pub use storage::BrowserStorage;
