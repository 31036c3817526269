//! A single named, typed, persisted preference
//!
//! Stored values are plain strings. Each value type decides how a stored
//! string (or its absence) becomes a typed value, and how it is written back.

use std::fmt;
use std::rc::Rc;

use crate::observable::{Observable, SubscriptionId};
use crate::storage::StorageAdapter;

/// Conversion between a typed preference value and its stored string
pub trait PreferenceValue: Clone + PartialEq + fmt::Debug + 'static {
    /// Typed value for what storage returned (`None` = key absent)
    fn decode(stored: Option<&str>, default: &Self) -> Self;

    /// String to store, or `None` to remove the entry
    fn encode(&self) -> Option<String>;
}

/// Only the literal "true" is true once a value has been stored
impl PreferenceValue for bool {
    fn decode(stored: Option<&str>, default: &Self) -> Self {
        match stored {
            Some(s) => s == "true",
            None => *default,
        }
    }

    fn encode(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// Decimal milliseconds, surrounding whitespace ignored
///
/// Anything that is not a plain unsigned number (`"120ms"`, `"-10"`, `"fast"`)
/// falls back to the default rather than being read leniently.
impl PreferenceValue for u32 {
    fn decode(stored: Option<&str>, default: &Self) -> Self {
        match stored.map(str::trim) {
            None | Some("") => *default,
            Some(s) => s.parse().unwrap_or_else(|_| {
                log::warn!("Ignoring malformed stored number {:?}, using {}", s, default);
                *default
            }),
        }
    }

    fn encode(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// Empty strings count as unset
impl PreferenceValue for String {
    fn decode(stored: Option<&str>, default: &Self) -> Self {
        match stored {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => default.clone(),
        }
    }

    fn encode(&self) -> Option<String> {
        Some(self.clone())
    }
}

/// Nullable string: absent stays `None`, clearing removes the entry
impl PreferenceValue for Option<String> {
    fn decode(stored: Option<&str>, default: &Self) -> Self {
        match stored {
            Some(s) => Some(s.to_string()),
            None => default.clone(),
        }
    }

    fn encode(&self) -> Option<String> {
        self.clone()
    }
}

/// Whether changes are written back to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Write every change straight to storage
    WriteThrough,
    /// Memory only; never read from or written to storage
    Never,
}

pub struct Preference<T: PreferenceValue> {
    key: &'static str,
    default: T,
    persistence: Persistence,
    value: Observable<T>,
    storage: Rc<StorageAdapter>,
}

impl<T: PreferenceValue> Preference<T> {
    /// Read the initial value from storage; this never writes
    pub fn load(
        key: &'static str,
        default: T,
        persistence: Persistence,
        storage: Rc<StorageAdapter>,
    ) -> Self {
        let initial = match persistence {
            Persistence::WriteThrough => T::decode(storage.get(key).as_deref(), &default),
            Persistence::Never => default.clone(),
        };

        Self {
            key,
            default,
            persistence,
            value: Observable::new(initial),
            storage,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    pub fn get(&self) -> &T {
        self.value.get()
    }

    /// Assign a new value: notify subscribers, then persist
    ///
    /// Assigning the current value is a no-op. Returns `true` if it changed.
    pub fn set(&mut self, value: T) -> bool {
        if !self.value.set(value) {
            return false;
        }
        if self.persistence() == Persistence::WriteThrough {
            self.persist();
        }
        true
    }

    pub fn reset(&mut self) -> bool {
        let default = self.default_value().clone();
        self.set(default)
    }

    /// Register a change callback (independent of persistence)
    pub fn subscribe(&mut self, callback: impl FnMut(&T) + 'static) -> SubscriptionId {
        self.value.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.value.unsubscribe(id)
    }

    fn persist(&self) {
        match self.value.get().encode() {
            Some(encoded) => self.storage.set(self.key, &encoded),
            None => self.storage.remove(self.key),
        }
    }
}

impl<T: PreferenceValue> fmt::Debug for Preference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preference")
            .field("key", &self.key)
            .field("value", self.value.get())
            .field("default", &self.default)
            .field("persistence", &self.persistence)
            .finish()
    }
}
