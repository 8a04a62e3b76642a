//! The real desktop host

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info, instrument};

use super::dialog::{self, DialogBackend, DialogCommand, PickerOutcome};
use super::{FileFilter, Host, MessageBoxKind};
use crate::apps::{self, LaunchCommand};
use crate::error::{NativeError, Result};

/// Host backed by the running desktop session
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }

    fn backend(&self) -> Result<DialogBackend> {
        DialogBackend::detect(apps::is_installed).ok_or_else(|| {
            NativeError::Dialog("no dialog tool found (install zenity or kdialog)".to_string())
        })
    }

    /// Run a dialog to completion and classify its output
    fn run_dialog(&self, backend: DialogBackend, command: DialogCommand) -> Result<PickerOutcome> {
        debug!(program = %command.program, "Showing dialog");

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| NativeError::Dialog(format!("Failed to run {}: {}", command.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        dialog::parse_dialog_output(backend, output.status.code(), &stdout, &stderr).inspect_err(
            |e| error!(program = %command.program, error = %e, "Dialog failed"),
        )
    }
}

impl Host for SystemHost {
    fn probe_automation(&self) -> Result<()> {
        let command = dialog::automation_probe();
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| NativeError::Automation(format!("{}: {}", command.program, e)))?;

        if output.status.success() {
            debug!(program = %command.program, "Automation backend available");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(NativeError::Automation(format!(
                "{} failed: {}",
                command.program,
                stderr.trim()
            )))
        }
    }

    fn open_uri(&self, uri: &str) -> Result<()> {
        open::that_detached(uri).map_err(|e| NativeError::Open {
            target: uri.to_string(),
            message: e.to_string(),
        })
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn reveal_path(&self, path: &Path) -> Result<()> {
        let spawn_error = |e: std::io::Error| NativeError::Open {
            target: path.display().to_string(),
            message: e.to_string(),
        };

        if cfg!(target_os = "macos") {
            Command::new("open")
                .arg("-R")
                .arg(path)
                .spawn()
                .map_err(spawn_error)?;
        } else if cfg!(windows) {
            let mut select = std::ffi::OsString::from("/select,");
            select.push(path.as_os_str());
            Command::new("explorer")
                .arg(select)
                .spawn()
                .map_err(spawn_error)?;
        } else {
            // No portable "select in file manager"; open the containing directory
            let dir = if path.is_dir() {
                path
            } else {
                path.parent().unwrap_or(path)
            };
            open::that_detached(dir).map_err(spawn_error)?;
        }

        info!("Revealed path in file manager");
        Ok(())
    }

    fn is_installed(&self, program: &str) -> bool {
        apps::is_installed(program)
    }

    fn launch(&self, command: &LaunchCommand, target: &Path) -> Result<()> {
        apps::launch_detached(command, target)
    }

    fn pick_directory(&self, default_path: Option<&Path>) -> Result<Vec<PathBuf>> {
        let backend = self.backend()?;
        let outcome = self.run_dialog(backend, dialog::directory_picker(backend, default_path))?;
        Ok(outcome.into_paths())
    }

    fn pick_files(&self, filters: &[FileFilter]) -> Result<Vec<PathBuf>> {
        let backend = self.backend()?;
        let outcome = self.run_dialog(backend, dialog::file_picker(backend, filters))?;
        Ok(outcome.into_paths())
    }

    fn show_message_box(&self, title: &str, message: &str, kind: MessageBoxKind) -> Result<()> {
        let backend = self.backend()?;
        // Any way of closing the box counts as acknowledged
        self.run_dialog(backend, dialog::message_box(backend, title, message, kind))?;
        Ok(())
    }

    fn exit(&self, code: i32) {
        info!(code, "Exiting");
        std::process::exit(code);
    }
}
