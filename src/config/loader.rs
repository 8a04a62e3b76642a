//! Configuration loading from file system

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::defaults::DEFAULT_CONFIG_PATH;
use super::types::NativeConfig;

/// Expanded path of the user config file
pub fn config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref())
}

/// Load configuration from ~/.native-service/config.json
///
/// Returns NativeConfig::default() if the file is missing or invalid.
pub fn load_config() -> NativeConfig {
    load_config_from(&config_path())
}

/// Load configuration from an explicit path
#[instrument(name = "load_config", skip(path), fields(path = %path.display()))]
pub fn load_config_from(path: &Path) -> NativeConfig {
    if !path.exists() {
        info!(path = %path.display(), "Config file not found, using defaults");
        return NativeConfig::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to read config file, using defaults");
            return NativeConfig::default();
        }
    };

    if contents.trim().is_empty() {
        info!("Config file is empty, using defaults");
        return NativeConfig::default();
    }

    match serde_json::from_str::<NativeConfig>(&contents) {
        Ok(config) => {
            info!(path = %path.display(), "Successfully loaded config");
            config
        }
        Err(e) => {
            let error_hint = if e.to_string().contains("invalid type") {
                "\n\nHint: values must match their types, e.g. \"terminateGraceMs\": 500 (number), \
                 \"editor\": \"code\" (string), \"runtimes\": {\"py\": \"python3\"} (object)"
            } else {
                ""
            };
            warn!(
                error = %e,
                hint = %error_hint,
                "Failed to parse config JSON, using defaults"
            );
            NativeConfig::default()
        }
    }
}
