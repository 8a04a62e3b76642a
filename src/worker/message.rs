//! Worker output protocol
//!
//! A worker emits one `start` control message, any number of stdout/stderr
//! log lines, and exactly one terminal control message (`ended` or `error`).
//!
//! On the wire every message is a JSON object tagged by `type`:
//!
//! ```json
//! {"type":"control","actions":"start"}
//! {"type":"stdout","message":"building..."}
//! {"type":"stderr","message":"warning: stale cache"}
//! {"type":"control","actions":"error","message":"build.mjs exited with code 1: boom"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which output pipe a log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout",
            LogStream::Stderr => "stderr",
        }
    }
}

/// Lifecycle events of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// The worker has just started; always the first message
    Start,
    /// The worker finished normally
    Ended,
    /// The worker failed; the message carries the diagnostic
    Error,
}

impl ControlAction {
    pub fn is_terminal(self) -> bool {
        match self {
            ControlAction::Start => false,
            ControlAction::Ended | ControlAction::Error => true,
        }
    }
}

/// One line of script output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub stream: LogStream,
    pub message: String,
}

/// A lifecycle event about the worker itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub action: ControlAction,
    pub message: Option<String>,
}

/// A message produced by a script worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireMessage", from = "WireMessage")]
pub enum WorkerMessage {
    Log(LogMessage),
    Control(ControlMessage),
}

impl WorkerMessage {
    pub fn stdout(message: impl Into<String>) -> Self {
        Self::Log(LogMessage {
            stream: LogStream::Stdout,
            message: message.into(),
        })
    }

    pub fn stderr(message: impl Into<String>) -> Self {
        Self::Log(LogMessage {
            stream: LogStream::Stderr,
            message: message.into(),
        })
    }

    pub fn start() -> Self {
        Self::Control(ControlMessage {
            action: ControlAction::Start,
            message: None,
        })
    }

    pub fn ended() -> Self {
        Self::Control(ControlMessage {
            action: ControlAction::Ended,
            message: None,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Control(ControlMessage {
            action: ControlAction::Error,
            message: Some(message.into()),
        })
    }

    /// The control action, if this is a control message
    pub fn control_action(&self) -> Option<ControlAction> {
        match self {
            WorkerMessage::Control(control) => Some(control.action),
            WorkerMessage::Log(_) => None,
        }
    }

    /// True for `ended` and `error`
    pub fn is_terminal(&self) -> bool {
        self.control_action()
            .is_some_and(ControlAction::is_terminal)
    }
}

impl fmt::Display for WorkerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerMessage::Log(log) => write!(f, "[{}] {}", log.stream.as_str(), log.message),
            WorkerMessage::Control(control) => {
                let action = match control.action {
                    ControlAction::Start => "start",
                    ControlAction::Ended => "ended",
                    ControlAction::Error => "error",
                };
                match &control.message {
                    Some(message) => write!(f, "[control] {}: {}", action, message),
                    None => write!(f, "[control] {}", action),
                }
            }
        }
    }
}

/// Flat wire shape; `actions` keeps the historical plural field name
#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireMessage {
    Stdout {
        message: String,
    },
    Stderr {
        message: String,
    },
    Control {
        actions: ControlAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl From<WorkerMessage> for WireMessage {
    fn from(message: WorkerMessage) -> Self {
        match message {
            WorkerMessage::Log(LogMessage {
                stream: LogStream::Stdout,
                message,
            }) => WireMessage::Stdout { message },
            WorkerMessage::Log(LogMessage {
                stream: LogStream::Stderr,
                message,
            }) => WireMessage::Stderr { message },
            WorkerMessage::Control(ControlMessage { action, message }) => WireMessage::Control {
                actions: action,
                message,
            },
        }
    }
}

impl From<WireMessage> for WorkerMessage {
    fn from(wire: WireMessage) -> Self {
        match wire {
            WireMessage::Stdout { message } => WorkerMessage::stdout(message),
            WireMessage::Stderr { message } => WorkerMessage::stderr(message),
            WireMessage::Control { actions, message } => {
                WorkerMessage::Control(ControlMessage {
                    action: actions,
                    message,
                })
            }
        }
    }
}
