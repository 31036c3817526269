//! Error types
//!
//! Storage failures are swallowed by the adapter; host failures are collected
//! by `Settings::apply` and reported once all setters have run.

use thiserror::Error;

/// A key-value backend could not complete an operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No backing store exists (e.g. local storage disabled by the browser)
    #[error("storage backend unavailable")]
    Unavailable,
    /// The backend rejected the operation (quota exceeded, security error, ...)
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A host setter could not be invoked
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host does not provide this setter
    #[error("host does not support `{0}`")]
    Unsupported(&'static str),
    /// The setter ran and reported a failure
    #[error("host setter `{setter}` failed: {message}")]
    Failed {
        setter: &'static str,
        message: String,
    },
}

impl HostError {
    /// Name of the setter that failed
    pub fn setter(&self) -> &'static str {
        match self {
            HostError::Unsupported(setter) => setter,
            HostError::Failed { setter, .. } => setter,
        }
    }
}

/// One or more setters failed during `Settings::apply`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} host setter(s) failed while applying settings", .failures.len())]
pub struct ApplyError {
    pub failures: Vec<HostError>,
}

/// A preference addressed by key could not be read or assigned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue { key: String, message: String },
}
