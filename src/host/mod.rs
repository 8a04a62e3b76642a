//! Desktop host integration
//!
//! The `Host` trait is the seam between native operations and the desktop:
//! dialogs, the system URI handler, the file manager, external app launches
//! and process exit. `SystemHost` drives the real desktop through platform
//! tools (`osascript`, `zenity`/`kdialog`, PowerShell).

mod dialog;
mod system;
mod window;

pub use dialog::{
    automation_probe, directory_picker, file_picker, message_box, parse_dialog_output,
    DialogBackend, DialogCommand, PickerOutcome,
};
pub use system::SystemHost;
pub use window::{WindowName, WindowRegistry};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::apps::LaunchCommand;
use crate::error::Result;

/// Icon/type of a message box
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageBoxKind {
    #[default]
    None,
    Info,
    Error,
    Question,
    Warning,
}

impl MessageBoxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageBoxKind::None => "none",
            MessageBoxKind::Info => "info",
            MessageBoxKind::Error => "error",
            MessageBoxKind::Question => "question",
            MessageBoxKind::Warning => "warning",
        }
    }
}

/// A named group of file extensions for the file picker
///
/// Extensions are given without the leading dot; `"*"` matches any file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// Glob patterns such as `*.md`, with any leading dot stripped
    pub fn patterns(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if ext == "*" {
                    "*".to_string()
                } else {
                    format!("*.{}", ext)
                }
            })
            .collect()
    }

    pub fn accepts_any(&self) -> bool {
        self.extensions.iter().any(|ext| ext == "*")
    }
}

/// Everything native operations need from the desktop
pub trait Host: Send + Sync {
    /// Fails when the desktop automation backend is not usable
    fn probe_automation(&self) -> Result<()>;

    /// Open a URI or path with the system handler
    fn open_uri(&self, uri: &str) -> Result<()>;

    /// Show a path selected in the file manager
    fn reveal_path(&self, path: &Path) -> Result<()>;

    fn is_installed(&self, program: &str) -> bool;

    /// Launch an external app on `target` without waiting for it
    fn launch(&self, command: &LaunchCommand, target: &Path) -> Result<()>;

    /// Empty result means the user dismissed the dialog
    fn pick_directory(&self, default_path: Option<&Path>) -> Result<Vec<PathBuf>>;

    /// Empty result means the user dismissed the dialog
    fn pick_files(&self, filters: &[FileFilter]) -> Result<Vec<PathBuf>>;

    fn show_message_box(&self, title: &str, message: &str, kind: MessageBoxKind) -> Result<()>;

    /// Terminate the host process
    fn exit(&self, code: i32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_patterns() {
        let filter = FileFilter::new("Docs", [".md", "txt", "", "*"]);
        assert_eq!(filter.patterns(), vec!["*.md", "*.txt", "*"]);
        assert!(filter.accepts_any());
        assert!(!FileFilter::new("Images", ["png"]).accepts_any());
    }

    #[test]
    fn test_message_box_kind_wire_names() {
        let kind: MessageBoxKind = serde_json::from_str(r#""warning""#).unwrap();
        assert_eq!(kind, MessageBoxKind::Warning);
        assert_eq!(serde_json::to_string(&MessageBoxKind::Info).unwrap(), r#""info""#);
        assert_eq!(MessageBoxKind::default(), MessageBoxKind::None);
    }
}
