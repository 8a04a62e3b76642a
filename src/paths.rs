//! Executable lookup that also covers locations GUI-launched processes miss

use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories checked after $PATH; desktop sessions often start with a minimal PATH
fn common_bin_dirs() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let mut dirs: Vec<PathBuf> = [
        ".local/bin",
        ".bun/bin",
        ".volta/bin",
        ".nvm/current/bin",
        "Library/pnpm",
        "bin",
    ]
    .iter()
    .filter_map(|rel| home.as_ref().map(|h| h.join(rel)))
    .collect();

    dirs.extend(
        ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin", "/snap/bin"]
            .iter()
            .map(PathBuf::from),
    );
    dirs
}

/// Find an executable by name or path
///
/// Names containing a path separator are checked as given. Bare names are
/// looked up on $PATH first and then in the common install directories.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let expanded = shellexpand::tilde(name);
    let candidate = Path::new(expanded.as_ref());

    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    if let Ok(found) = which::which(name) {
        debug!(name, path = %found.display(), "Executable found on PATH");
        return Some(found);
    }

    let found = common_bin_dirs()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file());

    match &found {
        Some(path) => debug!(name, path = %path.display(), "Executable found in common dir"),
        None => debug!(name, "Executable not found"),
    }
    found
}
