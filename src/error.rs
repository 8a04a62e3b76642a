use thiserror::Error;
use tracing::{error, warn};

/// How loudly a failed call is logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Warning,  // caller input or missing target
    Error,    // operation failed
    Critical, // host cannot serve this call at all
}

/// Errors surfaced by native operations and the script worker
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open '{target}': {message}")]
    Open { target: String, message: String },

    #[error("No application found for {kind}{}", quoted_suffix(.requested))]
    AppNotFound {
        kind: &'static str,
        requested: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Dialog failed: {0}")]
    Dialog(String),

    #[error("Automation backend unavailable: {0}")]
    Automation(String),

    #[error("Window '{0}' is not open")]
    WindowNotFound(String),

    #[error("Script worker failed: {message}")]
    WorkerFailed { message: String },
}

fn quoted_suffix(requested: &Option<String>) -> String {
    requested
        .as_deref()
        .map(|name| format!(" '{}'", name))
        .unwrap_or_default()
}

impl NativeError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Spawn { .. } => ErrorSeverity::Error,
            Self::Io(_) => ErrorSeverity::Error,
            Self::Open { .. } => ErrorSeverity::Error,
            Self::AppNotFound { .. } => ErrorSeverity::Warning,
            Self::FileNotFound(_) => ErrorSeverity::Warning,
            Self::Dialog(_) => ErrorSeverity::Error,
            Self::Automation(_) => ErrorSeverity::Critical,
            Self::WindowNotFound(_) => ErrorSeverity::Warning,
            Self::WorkerFailed { .. } => ErrorSeverity::Error,
        }
    }
}

pub type Result<T> = std::result::Result<T, NativeError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the caller doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use native_service::error::ResultExt;
///
/// let config = load_override().warn_on_err();
/// PROCESS_MANAGER.write_main_pid().log_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}
