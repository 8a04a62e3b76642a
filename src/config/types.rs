//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::defaults::*;

/// User configuration, stored as camelCase JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NativeConfig {
    /// Preferred editor (known editor name or command)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    /// Preferred git GUI application (known app name or command)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_gui_app: Option<String>,
    /// Path or name of the zx executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zx_path: Option<String>,
    /// Per-extension runtime overrides, e.g. `{"py": "python3.12"}`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub runtimes: HashMap<String, String>,
    /// Milliseconds between SIGTERM and SIGKILL on cancel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminate_grace_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_max_lines: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_max_bytes: Option<usize>,
}

impl NativeConfig {
    /// Returns the configured editor, falling back to the $EDITOR env var.
    ///
    /// There is no hard-coded final default; callers walk the known-editor
    /// table when this returns None.
    pub fn get_editor(&self) -> Option<String> {
        self.editor
            .clone()
            .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.trim().is_empty()))
    }

    pub fn get_git_gui_app(&self) -> Option<String> {
        self.git_gui_app.clone()
    }

    /// Returns the zx program, or DEFAULT_ZX_PROGRAM
    pub fn get_zx_program(&self) -> String {
        self.zx_path
            .clone()
            .unwrap_or_else(|| DEFAULT_ZX_PROGRAM.to_string())
    }

    /// Runtime override for a file extension (without the dot)
    pub fn runtime_for_extension(&self, extension: &str) -> Option<&str> {
        self.runtimes.get(extension).map(String::as_str)
    }

    pub fn get_terminate_grace(&self) -> Duration {
        Duration::from_millis(
            self.terminate_grace_ms
                .unwrap_or(DEFAULT_TERMINATE_GRACE_MS),
        )
    }

    pub fn get_stderr_max_lines(&self) -> usize {
        self.stderr_max_lines.unwrap_or(DEFAULT_STDERR_MAX_LINES)
    }

    pub fn get_stderr_max_bytes(&self) -> usize {
        self.stderr_max_bytes.unwrap_or(DEFAULT_STDERR_MAX_BYTES)
    }
}
