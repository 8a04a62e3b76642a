//! Structured JSONL logging to a file plus human-readable stderr output.
//!
//! - **JSONL to file** (~/.native-service/logs/native-service.jsonl)
//! - **Compact to stderr** for developers
//!
//! # Usage
//!
//! ```rust,ignore
//! use native_service::logging;
//!
//! // Keep the guard alive for the duration of the program
//! let _guard = logging::init();
//!
//! tracing::info!(event_type = "worker", action = "spawned", pid = 42, "Worker started");
//! ```

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "native-service.jsonl";

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the dual-output logging system.
///
/// Returns a guard that MUST be kept alive for the duration of the program.
/// If the log file cannot be opened only the stderr layer is installed.
pub fn init() -> LoggingGuard {
    let log_dir = get_log_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }

    let log_path = log_dir.join(LOG_FILE_NAME);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Stderr is the channel for humans; stdout may carry JSONL protocol traffic
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    let file = OpenOptions::new().create(true).append(true).open(&log_path);

    // A missing log file only drops the JSONL layer; stderr output still works
    let (json_layer, file_guard) = match file {
        Ok(file) => {
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .with_span_events(FmtSpan::NONE);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .init();

    tracing::info!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Get the log directory path (~/.native-service/logs/)
fn get_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".native-service").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("native-service-logs"))
}

/// Get the path to the JSONL log file
pub fn log_path() -> PathBuf {
    get_log_dir().join(LOG_FILE_NAME)
}

/// Log a worker lifecycle event with structured fields
pub fn log_worker_event(file_name: &str, action: &str, duration_ms: Option<u64>, success: bool) {
    match duration_ms {
        Some(duration) => {
            tracing::info!(
                event_type = "worker_event",
                file_name = file_name,
                action = action,
                duration_ms = duration,
                success = success,
                "Worker {} {}", action, file_name
            );
        }
        None => {
            tracing::info!(
                event_type = "worker_event",
                file_name = file_name,
                action = action,
                success = success,
                "Worker {} {}", action, file_name
            );
        }
    }
}

/// Log a pass-through native call with structured fields
pub fn log_native_call(operation: &str, target: Option<&str>) {
    let msg = match target {
        Some(t) => format!("{} {}", operation, t),
        None => operation.to_string(),
    };

    tracing::info!(
        event_type = "native_call",
        operation = operation,
        target = target,
        "{}", msg
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_ends_with_jsonl_file() {
        let path = log_path();
        assert!(path.ends_with("logs/native-service.jsonl"));
    }
}
