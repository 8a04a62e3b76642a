//! native-service - desktop pass-through operations and a script worker
//!
//! This library exposes native desktop operations (dialogs, opening files and
//! URIs, launching editors and git GUIs, quitting) and runs scripts in worker
//! processes whose output arrives as an ordered, cancellable message stream.

pub mod apps;
pub mod config;
pub mod error;
pub mod host;
pub mod ipc;
pub mod logging;
pub mod native;
pub mod paths;
pub mod process_manager;
pub mod worker;

pub use error::{NativeError, Result};
pub use native::{DesktopNativeService, NativeService};
pub use worker::{execute_script, ScriptRequest, WorkerMessage, WorkerStream};
