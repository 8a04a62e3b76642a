//! Configuration module - runtime settings for native operations and the script worker
//!
//! - `defaults` - All default constant values
//! - `types` - The `NativeConfig` struct and its getters
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{
    DEFAULT_STDERR_MAX_BYTES, DEFAULT_STDERR_MAX_LINES, DEFAULT_TERMINATE_GRACE_MS,
    DEFAULT_ZX_PROGRAM,
};
pub use loader::{config_path, load_config, load_config_from};
pub use types::NativeConfig;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
