//! `NativeService` backed by a desktop `Host`

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::NativeService;
use crate::apps::{self, AppKind};
use crate::config::NativeConfig;
use crate::error::{NativeError, Result};
use crate::host::{FileFilter, Host, MessageBoxKind, WindowName, WindowRegistry};
use crate::logging;
use crate::process_manager::{ProcessManager, PROCESS_MANAGER};
use crate::worker::{self, ScriptRequest, WorkerOptions, WorkerStream};

pub struct DesktopNativeService<H: Host> {
    host: H,
    config: NativeConfig,
    windows: WindowRegistry,
    processes: &'static ProcessManager,
}

impl<H: Host> DesktopNativeService<H> {
    pub fn new(host: H, config: NativeConfig) -> Self {
        Self {
            host,
            config,
            windows: WindowRegistry::default(),
            processes: &PROCESS_MANAGER,
        }
    }

    /// Use a different process table for `quit`
    pub fn with_process_manager(mut self, processes: &'static ProcessManager) -> Self {
        self.processes = processes;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &NativeConfig {
        &self.config
    }

    pub fn windows(&self) -> &WindowRegistry {
        &self.windows
    }

    fn open_in_app(&self, kind: AppKind, path: &Path, requested: Option<&str>) -> Result<()> {
        let path = expand_path(path);
        if !path.exists() {
            return Err(NativeError::FileNotFound(path.display().to_string()));
        }

        let configured = match kind {
            AppKind::Editor => self.config.get_editor(),
            AppKind::GitGui => self.config.get_git_gui_app(),
        };
        let command = apps::resolve_app(kind, requested, configured.as_deref(), |program| {
            self.host.is_installed(program)
        })?;

        info!(
            kind = kind.label(),
            program = %command.program,
            path = %path.display(),
            "Opening in external app"
        );
        self.host.launch(&command, &path)
    }
}

impl<H: Host> NativeService for DesktopNativeService<H> {
    fn try_nut(&self) -> Result<()> {
        logging::log_native_call("tryNut", None);
        self.host.probe_automation()
    }

    fn execute_zx_script(&self, request: ScriptRequest) -> Result<WorkerStream> {
        logging::log_native_call("executeZxScript$", Some(&request.file_name));
        let options =
            WorkerOptions::from_config(&request, &self.config).with_process_manager(self.processes);
        worker::execute_script_with(request, options)
    }

    #[instrument(skip(self))]
    fn open(&self, uri: &str, is_directory: bool) -> Result<()> {
        logging::log_native_call("open", Some(uri));

        let uri = uri.trim();
        if uri.is_empty() {
            return Err(NativeError::Open {
                target: String::new(),
                message: "empty URI".to_string(),
            });
        }

        if !is_directory && has_scheme(uri) {
            return self.host.open_uri(uri);
        }

        let path = local_path(uri);
        if !path.exists() {
            return Err(NativeError::Open {
                target: uri.to_string(),
                message: "path does not exist".to_string(),
            });
        }

        if is_directory {
            self.host.reveal_path(&path)
        } else {
            self.host.open_uri(&path.to_string_lossy())
        }
    }

    fn open_in_editor(&self, path: &Path, editor_name: Option<&str>) -> Result<()> {
        logging::log_native_call("openInEditor", Some(&path.to_string_lossy()));
        self.open_in_app(AppKind::Editor, path, editor_name)
    }

    fn open_in_git_gui_app(&self, path: &Path, app_name: Option<&str>) -> Result<()> {
        logging::log_native_call("openInGitGuiApp", Some(&path.to_string_lossy()));
        self.open_in_app(AppKind::GitGui, path, app_name)
    }

    fn pick_directory(&self, default_path: Option<&Path>) -> Result<Vec<PathBuf>> {
        logging::log_native_call("pickDirectory", None);

        let default_path = default_path.map(expand_path);
        let default_path = match default_path {
            Some(p) if p.is_dir() => Some(p),
            Some(p) => {
                warn!(path = %p.display(), "Default path is not a directory, ignoring");
                None
            }
            None => None,
        };
        self.host.pick_directory(default_path.as_deref())
    }

    fn pick_file(&self, filters: &[FileFilter]) -> Result<Vec<PathBuf>> {
        logging::log_native_call("pickFile", None);
        self.host.pick_files(filters)
    }

    fn quit(&self) {
        logging::log_native_call("quit", None);
        self.processes.kill_all_processes();
        self.processes.remove_main_pid();
        self.host.exit(0);
    }

    fn show_message_box(
        &self,
        message: &str,
        kind: MessageBoxKind,
        window: Option<WindowName>,
    ) -> Result<()> {
        let window = window.unwrap_or_default();
        logging::log_native_call("showElectronMessageBox", Some(window.as_str()));

        if !self.windows.is_open(window) {
            return Err(NativeError::WindowNotFound(window.as_str().to_string()));
        }
        self.host.show_message_box(window.title(), message, kind)
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// True for `https://…`, `mailto:…` and similar; false for `C:\…` and plain paths
fn has_scheme(uri: &str) -> bool {
    match uri.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !scheme.eq_ignore_ascii_case("file")
        }
        None => false,
    }
}

/// Turn a path or `file://` URI into a local path
fn local_path(uri: &str) -> PathBuf {
    let stripped = uri
        .strip_prefix("file://")
        .or_else(|| uri.strip_prefix("file:"))
        .unwrap_or(uri);
    expand_path(Path::new(stripped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("https://example.com"));
        assert!(has_scheme("mailto:me@example.com"));
        assert!(has_scheme("vscode://file/tmp"));
        assert!(!has_scheme("/tmp/file.txt"));
        assert!(!has_scheme("C:\\Users\\me"));
        assert!(!has_scheme("file:///tmp/x"));
        assert!(!has_scheme("relative/path"));
    }

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("file:///tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(local_path("/tmp/y"), PathBuf::from("/tmp/y"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(local_path("~/notes"), home.join("notes"));
        }
    }
}
