//! External application resolution and launching
//!
//! Editors and git GUI clients are resolved from, in order:
//! 1. an explicitly requested name (a known app name or a raw command)
//! 2. the configured app (`editor` / `gitGuiApp` in config.json, then `$EDITOR` for editors)
//! 3. the first known app found on PATH
//!
//! Apps are launched detached; the service never waits for them to close.

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, instrument, warn};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use crate::error::{NativeError, Result};
use crate::paths::find_executable;

/// An application the service knows how to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownApp {
    /// Display name, matched case-insensitively
    pub name: &'static str,
    /// Alternative names, matched case-insensitively
    pub aliases: &'static [&'static str],
    pub command: &'static str,
    /// Arguments placed before the target path
    pub args: &'static [&'static str],
}

pub const KNOWN_EDITORS: &[KnownApp] = &[
    KnownApp {
        name: "Visual Studio Code",
        aliases: &["vscode", "vs code", "code"],
        command: "code",
        args: &[],
    },
    KnownApp {
        name: "Cursor",
        aliases: &[],
        command: "cursor",
        args: &[],
    },
    KnownApp {
        name: "Zed",
        aliases: &[],
        command: "zed",
        args: &[],
    },
    KnownApp {
        name: "Sublime Text",
        aliases: &["sublime", "subl"],
        command: "subl",
        args: &[],
    },
    KnownApp {
        name: "WebStorm",
        aliases: &[],
        command: "webstorm",
        args: &[],
    },
    KnownApp {
        name: "VSCodium",
        aliases: &["codium"],
        command: "codium",
        args: &[],
    },
    KnownApp {
        name: "Atom",
        aliases: &[],
        command: "atom",
        args: &[],
    },
    KnownApp {
        name: "Kate",
        aliases: &[],
        command: "kate",
        args: &[],
    },
    KnownApp {
        name: "gedit",
        aliases: &[],
        command: "gedit",
        args: &[],
    },
];

pub const KNOWN_GIT_GUI_APPS: &[KnownApp] = &[
    KnownApp {
        name: "GitHub Desktop",
        aliases: &["github"],
        command: "github",
        args: &[],
    },
    KnownApp {
        name: "GitKraken",
        aliases: &[],
        command: "gitkraken",
        args: &["-p"],
    },
    KnownApp {
        name: "Sourcetree",
        aliases: &["stree"],
        command: "stree",
        args: &[],
    },
    KnownApp {
        name: "Fork",
        aliases: &[],
        command: "fork",
        args: &[],
    },
    KnownApp {
        name: "gitg",
        aliases: &[],
        command: "gitg",
        args: &[],
    },
    KnownApp {
        name: "Git Cola",
        aliases: &["git-cola", "cola"],
        command: "git-cola",
        args: &["--repo"],
    },
    KnownApp {
        name: "Git GUI",
        aliases: &["git gui", "git-gui"],
        command: "git",
        args: &["gui"],
    },
];

/// Which family of app to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppKind {
    Editor,
    GitGui,
}

impl AppKind {
    pub fn label(self) -> &'static str {
        match self {
            AppKind::Editor => "editor",
            AppKind::GitGui => "git GUI app",
        }
    }

    pub fn known_apps(self) -> &'static [KnownApp] {
        match self {
            AppKind::Editor => KNOWN_EDITORS,
            AppKind::GitGui => KNOWN_GIT_GUI_APPS,
        }
    }
}

/// A resolved program plus the arguments that precede the target path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    fn from_known(app: &KnownApp) -> Self {
        Self {
            program: app.command.to_string(),
            args: app.args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Split a raw command such as `"code --wait"`
    fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let program = parts.next()?.to_string();
        Some(Self {
            program,
            args: parts.map(str::to_string).collect(),
        })
    }
}

/// Find a known app by display name, alias or command (case-insensitive)
pub fn find_known_app(kind: AppKind, name: &str) -> Option<&'static KnownApp> {
    let wanted = name.trim().to_lowercase();
    kind.known_apps().iter().find(|app| {
        app.name.to_lowercase() == wanted
            || app.command == wanted
            || app.aliases.iter().any(|alias| *alias == wanted)
    })
}

fn command_for_name(kind: AppKind, name: &str) -> Option<LaunchCommand> {
    match find_known_app(kind, name) {
        Some(app) => Some(LaunchCommand::from_known(app)),
        None => LaunchCommand::parse(name),
    }
}

/// Resolve which app to launch
///
/// `is_installed` decides whether a program can be run; production callers
/// pass a PATH lookup.
pub fn resolve_app(
    kind: AppKind,
    requested: Option<&str>,
    configured: Option<&str>,
    is_installed: impl Fn(&str) -> bool,
) -> Result<LaunchCommand> {
    let requested = requested.map(str::trim).filter(|name| !name.is_empty());

    if let Some(name) = requested {
        return match command_for_name(kind, name) {
            Some(command) if is_installed(&command.program) => {
                debug!(
                    kind = kind.label(),
                    name,
                    program = %command.program,
                    "Using requested app"
                );
                Ok(command)
            }
            _ => Err(NativeError::AppNotFound {
                kind: kind.label(),
                requested: Some(name.to_string()),
            }),
        };
    }

    if let Some(name) = configured.map(str::trim).filter(|name| !name.is_empty()) {
        match command_for_name(kind, name) {
            Some(command) if is_installed(&command.program) => {
                debug!(
                    kind = kind.label(),
                    name,
                    program = %command.program,
                    "Using configured app"
                );
                return Ok(command);
            }
            _ => warn!(
                kind = kind.label(),
                name,
                "Configured app is not installed, trying known apps"
            ),
        }
    }

    kind.known_apps()
        .iter()
        .find(|app| is_installed(app.command))
        .map(|app| {
            debug!(kind = kind.label(), app = app.name, "Using first installed known app");
            LaunchCommand::from_known(app)
        })
        .ok_or(NativeError::AppNotFound {
            kind: kind.label(),
            requested: None,
        })
}

/// True when `program` can be found on PATH or in a common bin directory
pub fn is_installed(program: &str) -> bool {
    find_executable(program).is_some()
}

/// Launch `command` with `target` appended, without waiting for it
#[instrument(skip_all, fields(program = %command.program, target = %target.display()))]
pub fn launch_detached(command: &LaunchCommand, target: &Path) -> Result<()> {
    let program = find_executable(&command.program)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| command.program.clone());

    let mut cmd = Command::new(&program);
    cmd.args(&command.args)
        .arg(target)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // Own process group, so quitting the service doesn't take the app down
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|source| NativeError::Spawn {
        program: program.clone(),
        source,
    })?;

    info!(pid = child.id(), "Launched external app");

    // Reap in the background so the app doesn't linger as a zombie
    let reaper = std::thread::Builder::new()
        .name("app-reaper".to_string())
        .spawn(move || {
            let _ = child.wait();
        });
    if let Err(e) = reaper {
        warn!(error = %e, "Failed to spawn reaper thread");
    }

    Ok(())
}
