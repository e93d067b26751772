use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Document lifecycle milestones a caller can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    DomContentLoaded,
    Load,
    /// Loaded, and no new network resources for a quiet window.
    NetworkIdle,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::Load => "load",
            LoadState::NetworkIdle => "networkidle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementState {
    Attached,
    Detached,
    Visible,
    Hidden,
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementState::Attached => "attached",
            ElementState::Detached => "detached",
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the document load progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSnapshot {
    /// `document.readyState`: "loading", "interactive" or "complete".
    pub ready_state: String,
    /// Number of resource timing entries recorded so far.
    pub resource_count: u64,
}

impl LoadSnapshot {
    pub fn new(ready_state: impl Into<String>, resource_count: u64) -> Self {
        Self {
            ready_state: ready_state.into(),
            resource_count,
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self.ready_state.as_str(), "interactive" | "complete")
    }

    pub fn is_complete(&self) -> bool {
        self.ready_state == "complete"
    }
}

/// Value to put into a named form control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    Checked(bool),
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

impl From<bool> for FormValue {
    fn from(value: bool) -> Self {
        FormValue::Checked(value)
    }
}
