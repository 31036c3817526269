//! The host application that settings are applied to
//!
//! Every setter has a default body returning [`HostError::Unsupported`], so a
//! host only implements what it actually exposes.

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Credentials for gist sync
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GistCredentials {
    pub token: Option<String>,
    pub file: Option<String>,
}

/// The node canvas
pub trait Workspace {
    /// Minimum milliseconds between redraws
    fn set_throttle(&mut self, _ms: u32) -> Result<(), HostError> {
        Err(HostError::Unsupported("workspace.setThrottle"))
    }
}

/// Setters consumed by `Settings::apply`
pub trait HostApp {
    fn set_theme(&mut self, _name: &str) -> Result<(), HostError> {
        Err(HostError::Unsupported("setTheme"))
    }

    fn set_language(&mut self, _code: &str) -> Result<(), HostError> {
        Err(HostError::Unsupported("setLanguage"))
    }

    /// Flip night mode (takes no argument)
    fn toggle_night_mode(&mut self) -> Result<(), HostError> {
        Err(HostError::Unsupported("toggleNightMode"))
    }

    fn set_markup_language(&mut self, _name: &str) -> Result<(), HostError> {
        Err(HostError::Unsupported("setMarkupLanguage"))
    }

    fn set_gist_credentials(&mut self, _credentials: GistCredentials) -> Result<(), HostError> {
        Err(HostError::Unsupported("setGistCredentials"))
    }

    /// `None` when the host has no workspace
    fn workspace_mut(&mut self) -> Option<&mut dyn Workspace> {
        None
    }
}
