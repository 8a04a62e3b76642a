//! Script worker execution
//!
//! This module runs a script in a child process and turns its output into an
//! ordered message stream:
//! - `message`: the wire protocol (`start`, stdout/stderr lines, `ended`/`error`)
//! - `request`: script requests, runtime selection, temp-file preparation
//! - `runner`: spawning, pipe readers, exit-status classification
//! - `stream`: the subscriber side, with cancellation
//! - `process`: process-group ownership and termination
//! - `stderr_buffer`: bounded stderr tail for failure diagnostics

mod message;
mod process;
mod request;
mod runner;
mod stderr_buffer;
mod stream;

pub use message::{ControlAction, ControlMessage, LogMessage, LogStream, WorkerMessage};
pub use process::ProcessHandle;
pub use request::{PreparedScript, ScriptRequest, ScriptRuntime};
pub use runner::{execute_script, execute_script_with, WorkerOptions};
pub use stderr_buffer::StderrBuffer;
pub use stream::{CancelHandle, ScriptOutput, WorkerState, WorkerStream};

#[cfg(unix)]
pub use process::{kill_process_group, process_group_alive};

#[cfg(all(test, unix))]
#[path = "worker_tests.rs"]
mod worker_tests;
