//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Location of the user config file (tilde-expanded at load time)
pub const DEFAULT_CONFIG_PATH: &str = "~/.native-service/config.json";

/// Program used for zx-style scripts when no override is configured
pub const DEFAULT_ZX_PROGRAM: &str = "zx";

/// Grace period between SIGTERM and SIGKILL when cancelling a worker
pub const DEFAULT_TERMINATE_GRACE_MS: u64 = 250;

/// Stderr tail kept for worker failure diagnostics
pub const DEFAULT_STDERR_MAX_LINES: usize = 500;
pub const DEFAULT_STDERR_MAX_BYTES: usize = 4 * 1024;
