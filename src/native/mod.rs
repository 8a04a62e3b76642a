//! Pass-through native operations
//!
//! `NativeService` is the full operation surface exposed to callers. Every
//! operation except `execute_zx_script` is a thin wrapper over the desktop
//! `Host`; script execution goes to the `worker` module.

mod desktop;

pub use desktop::DesktopNativeService;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::host::{FileFilter, MessageBoxKind, WindowName};
use crate::worker::{ScriptRequest, WorkerStream};

pub trait NativeService: Send + Sync {
    /// Check that desktop automation is usable
    fn try_nut(&self) -> Result<()>;

    /// Run a script in a fresh worker process
    ///
    /// Only temp-file preparation fails here; runtime problems arrive as an
    /// `error` message on the stream.
    fn execute_zx_script(&self, request: ScriptRequest) -> Result<WorkerStream>;

    /// Open a URI with the system handler, or reveal it in the file manager
    fn open(&self, uri: &str, is_directory: bool) -> Result<()>;

    fn open_in_editor(&self, path: &Path, editor_name: Option<&str>) -> Result<()>;

    fn open_in_git_gui_app(&self, path: &Path, app_name: Option<&str>) -> Result<()>;

    /// Empty when the dialog was dismissed
    fn pick_directory(&self, default_path: Option<&Path>) -> Result<Vec<PathBuf>>;

    /// Empty when the dialog was dismissed
    fn pick_file(&self, filters: &[FileFilter]) -> Result<Vec<PathBuf>>;

    /// Kill tracked workers and exit the process
    fn quit(&self);

    /// `window` defaults to the main window
    fn show_message_box(
        &self,
        message: &str,
        kind: MessageBoxKind,
        window: Option<WindowName>,
    ) -> Result<()>;
}

#[cfg(test)]
#[path = "native_tests.rs"]
mod native_tests;
