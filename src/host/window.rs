//! Window names and the registry of open windows

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Windows a message box can be attached to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowName {
    #[default]
    Main,
    MenuBar,
    Preferences,
    AddWorkspace,
    EditWorkspace,
    Notifications,
    About,
}

impl WindowName {
    pub fn as_str(self) -> &'static str {
        match self {
            WindowName::Main => "main",
            WindowName::MenuBar => "menuBar",
            WindowName::Preferences => "preferences",
            WindowName::AddWorkspace => "addWorkspace",
            WindowName::EditWorkspace => "editWorkspace",
            WindowName::Notifications => "notifications",
            WindowName::About => "about",
        }
    }

    /// Human-readable title used for dialogs
    pub fn title(self) -> &'static str {
        match self {
            WindowName::Main => "Main",
            WindowName::MenuBar => "Menu Bar",
            WindowName::Preferences => "Preferences",
            WindowName::AddWorkspace => "Add Workspace",
            WindowName::EditWorkspace => "Edit Workspace",
            WindowName::Notifications => "Notifications",
            WindowName::About => "About",
        }
    }
}

impl fmt::Display for WindowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks which windows are currently open
///
/// Starts with only the main window registered.
#[derive(Debug)]
pub struct WindowRegistry {
    open: RwLock<HashSet<WindowName>>,
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::with_windows([WindowName::Main])
    }
}

impl WindowRegistry {
    pub fn with_windows(windows: impl IntoIterator<Item = WindowName>) -> Self {
        Self {
            open: RwLock::new(windows.into_iter().collect()),
        }
    }

    /// Returns false if the window was already registered
    pub fn register(&self, window: WindowName) -> bool {
        let inserted = self.open.write().insert(window);
        debug!(window = %window, inserted, "Window registered");
        inserted
    }

    /// Returns false if the window was not registered
    pub fn unregister(&self, window: WindowName) -> bool {
        let removed = self.open.write().remove(&window);
        debug!(window = %window, removed, "Window unregistered");
        removed
    }

    pub fn is_open(&self, window: WindowName) -> bool {
        self.open.read().contains(&window)
    }

    pub fn open_windows(&self) -> Vec<WindowName> {
        let mut windows: Vec<_> = self.open.read().iter().copied().collect();
        windows.sort_by_key(|w| w.as_str());
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_main_only() {
        let registry = WindowRegistry::default();
        assert!(registry.is_open(WindowName::Main));
        assert!(!registry.is_open(WindowName::Preferences));
        assert_eq!(registry.open_windows(), vec![WindowName::Main]);
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = WindowRegistry::default();
        assert!(registry.register(WindowName::Preferences));
        assert!(!registry.register(WindowName::Preferences));
        assert!(registry.is_open(WindowName::Preferences));

        assert!(registry.unregister(WindowName::Main));
        assert!(!registry.unregister(WindowName::Main));
        assert!(!registry.is_open(WindowName::Main));
    }

    #[test]
    fn test_window_name_wire_form() {
        let name: WindowName = serde_json::from_str(r#""menuBar""#).unwrap();
        assert_eq!(name, WindowName::MenuBar);
        assert_eq!(
            serde_json::to_string(&WindowName::AddWorkspace).unwrap(),
            r#""addWorkspace""#
        );
        assert_eq!(WindowName::Preferences.title(), "Preferences");
    }
}
