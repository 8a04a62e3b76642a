//! Platform dialog commands and their output parsing
//!
//! Dialogs are shown by shelling out to the platform's scripting tool. The
//! builders here only produce argv; `SystemHost` runs them. Keeping them pure
//! lets the exact invocations be tested on any platform.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::{FileFilter, MessageBoxKind};
use crate::error::{NativeError, Result};

/// AppleScript error number for a dialog the user cancelled
const APPLESCRIPT_USER_CANCELED: &str = "-128";

/// The tool used to show dialogs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogBackend {
    AppleScript,
    Zenity,
    KDialog,
    PowerShell,
}

impl DialogBackend {
    pub fn program(self) -> &'static str {
        match self {
            DialogBackend::AppleScript => "osascript",
            DialogBackend::Zenity => "zenity",
            DialogBackend::KDialog => "kdialog",
            DialogBackend::PowerShell => "powershell",
        }
    }

    /// The platform backend; on Linux the first of zenity/kdialog that is installed
    pub fn detect(is_installed: impl Fn(&str) -> bool) -> Option<Self> {
        if cfg!(target_os = "macos") {
            return Some(DialogBackend::AppleScript);
        }
        if cfg!(windows) {
            return Some(DialogBackend::PowerShell);
        }
        [DialogBackend::Zenity, DialogBackend::KDialog]
            .into_iter()
            .find(|backend| is_installed(backend.program()))
    }
}

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl DialogCommand {
    fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }

    fn applescript(lines: &[String]) -> Self {
        let args = lines
            .iter()
            .flat_map(|line| ["-e".to_string(), line.clone()])
            .collect();
        Self::new("osascript", args)
    }

    fn powershell(script: String) -> Self {
        Self::new(
            "powershell",
            vec!["-NoProfile".to_string(), "-Command".to_string(), script],
        )
    }
}

/// Result of a picker dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Selected(Vec<PathBuf>),
    Dismissed,
}

impl PickerOutcome {
    pub fn into_paths(self) -> Vec<PathBuf> {
        match self {
            PickerOutcome::Selected(paths) => paths,
            PickerOutcome::Dismissed => Vec::new(),
        }
    }
}

fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn powershell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

const POWERSHELL_FORMS: &str = "Add-Type -AssemblyName System.Windows.Forms";

pub fn directory_picker(backend: DialogBackend, default_path: Option<&Path>) -> DialogCommand {
    let default = default_path.map(|p| p.to_string_lossy().into_owned());

    match backend {
        DialogBackend::AppleScript => {
            let location = default
                .map(|p| format!(" default location POSIX file {}", applescript_quote(&p)))
                .unwrap_or_default();
            DialogCommand::applescript(&[format!(
                "POSIX path of (choose folder with prompt \"Select a folder\"{})",
                location
            )])
        }
        DialogBackend::Zenity => {
            let mut args = vec![
                "--file-selection".to_string(),
                "--directory".to_string(),
                "--title=Select a folder".to_string(),
            ];
            if let Some(p) = default {
                // A trailing slash makes zenity open inside the directory
                args.push(format!("--filename={}/", p.trim_end_matches('/')));
            }
            DialogCommand::new("zenity", args)
        }
        DialogBackend::KDialog => DialogCommand::new(
            "kdialog",
            vec![
                "--title".to_string(),
                "Select a folder".to_string(),
                "--getexistingdirectory".to_string(),
                default.unwrap_or_else(|| ".".to_string()),
            ],
        ),
        DialogBackend::PowerShell => {
            let selected = default
                .map(|p| format!("$d.SelectedPath = {}; ", powershell_quote(&p)))
                .unwrap_or_default();
            DialogCommand::powershell(format!(
                "{}; $d = New-Object System.Windows.Forms.FolderBrowserDialog; {}if ($d.ShowDialog() -eq 'OK') {{ $d.SelectedPath }}",
                POWERSHELL_FORMS, selected
            ))
        }
    }
}

pub fn file_picker(backend: DialogBackend, filters: &[FileFilter]) -> DialogCommand {
    // Any wildcard filter means no restriction at all
    let restricted = !filters.is_empty() && !filters.iter().any(FileFilter::accepts_any);

    match backend {
        DialogBackend::AppleScript => {
            let of_type = if restricted {
                let types: Vec<String> = filters
                    .iter()
                    .flat_map(|f| f.extensions.iter())
                    .map(|ext| applescript_quote(ext.trim_start_matches('.')))
                    .collect();
                format!(" of type {{{}}}", types.join(", "))
            } else {
                String::new()
            };
            DialogCommand::applescript(&[
                format!(
                    "set picked to choose file with prompt \"Select files\"{} with multiple selections allowed",
                    of_type
                ),
                "set out to \"\"".to_string(),
                "repeat with f in picked".to_string(),
                "set out to out & POSIX path of f & linefeed".to_string(),
                "end repeat".to_string(),
                "return out".to_string(),
            ])
        }
        DialogBackend::Zenity => {
            let mut args = vec![
                "--file-selection".to_string(),
                "--multiple".to_string(),
                "--separator=\n".to_string(),
                "--title=Select files".to_string(),
            ];
            for filter in filters {
                args.push(format!(
                    "--file-filter={} | {}",
                    filter.name,
                    filter.patterns().join(" ")
                ));
            }
            DialogCommand::new("zenity", args)
        }
        DialogBackend::KDialog => {
            let mut args = vec![
                "--title".to_string(),
                "Select files".to_string(),
                "--multiple".to_string(),
                "--separate-output".to_string(),
                "--getopenfilename".to_string(),
                ".".to_string(),
            ];
            if !filters.is_empty() {
                let spec: Vec<String> = filters
                    .iter()
                    .map(|f| format!("{}|{}", f.patterns().join(" "), f.name))
                    .collect();
                args.push(spec.join("\n"));
            }
            DialogCommand::new("kdialog", args)
        }
        DialogBackend::PowerShell => {
            let filter = if filters.is_empty() {
                String::new()
            } else {
                let spec: Vec<String> = filters
                    .iter()
                    .map(|f| {
                        let patterns = f.patterns().join(";");
                        format!("{} ({})|{}", f.name, patterns, patterns)
                    })
                    .collect();
                format!("$d.Filter = {}; ", powershell_quote(&spec.join("|")))
            };
            DialogCommand::powershell(format!(
                "{}; $d = New-Object System.Windows.Forms.OpenFileDialog; $d.Multiselect = $true; {}if ($d.ShowDialog() -eq 'OK') {{ $d.FileNames }}",
                POWERSHELL_FORMS, filter
            ))
        }
    }
}

pub fn message_box(
    backend: DialogBackend,
    title: &str,
    message: &str,
    kind: MessageBoxKind,
) -> DialogCommand {
    match backend {
        DialogBackend::AppleScript => {
            let style = match kind {
                MessageBoxKind::Error => "critical",
                MessageBoxKind::Warning => "warning",
                MessageBoxKind::None | MessageBoxKind::Info | MessageBoxKind::Question => {
                    "informational"
                }
            };
            DialogCommand::applescript(&[format!(
                "display alert {} message {} as {}",
                applescript_quote(title),
                applescript_quote(message),
                style
            )])
        }
        DialogBackend::Zenity => {
            let flag = match kind {
                MessageBoxKind::Error => "--error",
                MessageBoxKind::Warning => "--warning",
                MessageBoxKind::Question => "--question",
                MessageBoxKind::None | MessageBoxKind::Info => "--info",
            };
            DialogCommand::new(
                "zenity",
                vec![
                    flag.to_string(),
                    "--no-markup".to_string(),
                    format!("--title={}", title),
                    format!("--text={}", message),
                ],
            )
        }
        DialogBackend::KDialog => {
            let flag = match kind {
                MessageBoxKind::Error => "--error",
                MessageBoxKind::Warning => "--sorry",
                MessageBoxKind::None | MessageBoxKind::Info | MessageBoxKind::Question => {
                    "--msgbox"
                }
            };
            DialogCommand::new(
                "kdialog",
                vec![
                    "--title".to_string(),
                    title.to_string(),
                    flag.to_string(),
                    message.to_string(),
                ],
            )
        }
        DialogBackend::PowerShell => {
            let icon = match kind {
                MessageBoxKind::None => "None",
                MessageBoxKind::Info => "Information",
                MessageBoxKind::Error => "Error",
                MessageBoxKind::Question => "Question",
                MessageBoxKind::Warning => "Warning",
            };
            DialogCommand::powershell(format!(
                "{}; [System.Windows.Forms.MessageBox]::Show({}, {}, 'OK', '{}') | Out-Null",
                POWERSHELL_FORMS,
                powershell_quote(message),
                powershell_quote(title),
                icon
            ))
        }
    }
}

/// A harmless query that only succeeds when desktop automation works
pub fn automation_probe() -> DialogCommand {
    if cfg!(target_os = "macos") {
        DialogCommand::applescript(&[
            "tell application \"System Events\" to get name of first process".to_string(),
        ])
    } else if cfg!(windows) {
        DialogCommand::powershell(format!(
            "{}; [System.Windows.Forms.Cursor]::Position | Out-Null",
            POWERSHELL_FORMS
        ))
    } else {
        DialogCommand::new("xdotool", vec!["getmouselocation".to_string()])
    }
}

/// Interpret a finished dialog process
///
/// Cancel is not an error: zenity and kdialog exit 1, AppleScript reports
/// error -128, PowerShell prints nothing.
pub fn parse_dialog_output(
    backend: DialogBackend,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> Result<PickerOutcome> {
    match (backend, code) {
        (_, Some(0)) => {
            let paths: Vec<PathBuf> = stdout
                .lines()
                .map(|line| line.trim_end_matches('\r').trim())
                .filter(|line| !line.is_empty())
                .map(|line| {
                    // choose folder returns "/Users/me/dir/"
                    let trimmed = line.trim_end_matches('/');
                    PathBuf::from(if trimmed.is_empty() { "/" } else { trimmed })
                })
                .collect();
            if paths.is_empty() {
                debug!(backend = backend.program(), "Dialog returned no selection");
                Ok(PickerOutcome::Dismissed)
            } else {
                Ok(PickerOutcome::Selected(paths))
            }
        }
        (DialogBackend::Zenity | DialogBackend::KDialog, Some(1)) => Ok(PickerOutcome::Dismissed),
        (DialogBackend::AppleScript, Some(_)) if stderr.contains(APPLESCRIPT_USER_CANCELED) => {
            Ok(PickerOutcome::Dismissed)
        }
        (_, code) => {
            let code = code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            Err(NativeError::Dialog(format!(
                "{} exited with {}: {}",
                backend.program(),
                code,
                stderr.trim()
            )))
        }
    }
}
