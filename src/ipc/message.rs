//! RPC request and response shapes
//!
//! ```json
//! {"id":1,"method":"pickDirectory","params":{"defaultPath":"/tmp"}}
//! {"id":1,"type":"result","value":["/tmp/notes"]}
//! {"id":2,"type":"next","value":{"type":"control","actions":"start"}}
//! {"id":2,"type":"complete"}
//! {"id":3,"type":"error","error":"Window 'preferences' is not open"}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use super::descriptor;
use crate::host::{FileFilter, MessageBoxKind, WindowName};
use crate::worker::{ScriptRequest, WorkerMessage};

/// Id used for errors about lines whose own id could not be read
pub const UNKNOWN_REQUEST_ID: u64 = 0;

/// One request line before its params are interpreted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenParams {
    pub uri: String,
    #[serde(default)]
    pub is_directory: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInAppParams {
    pub file_path: PathBuf,
    #[serde(default, alias = "appName")]
    pub editor_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickDirectoryParams {
    #[serde(default)]
    pub default_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PickFileParams {
    #[serde(default)]
    pub filters: Vec<FileFilter>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBoxParams {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: MessageBoxKind,
    #[serde(default, alias = "WindowName")]
    pub window_name: Option<WindowName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnsubscribeParams {
    pub target: u64,
}

/// A request with its params decoded for the named method
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    TryNut,
    ExecuteZxScript(ScriptRequest),
    Open(OpenParams),
    OpenInEditor(OpenInAppParams),
    OpenInGitGuiApp(OpenInAppParams),
    PickDirectory(PickDirectoryParams),
    PickFile(PickFileParams),
    Quit,
    ShowMessageBox(MessageBoxParams),
    Unsubscribe(UnsubscribeParams),
}

fn decode<T: DeserializeOwned>(params: Value) -> Result<T, String> {
    // A call without params is the same as one with `{}`
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| format!("invalid params: {}", e))
}

impl NativeCall {
    pub fn from_request(method: &str, params: Value) -> Result<Self, String> {
        let call = match method {
            descriptor::TRY_NUT => NativeCall::TryNut,
            descriptor::EXECUTE_ZX_SCRIPT => NativeCall::ExecuteZxScript(decode(params)?),
            descriptor::OPEN => NativeCall::Open(decode(params)?),
            descriptor::OPEN_IN_EDITOR => NativeCall::OpenInEditor(decode(params)?),
            descriptor::OPEN_IN_GIT_GUI_APP => NativeCall::OpenInGitGuiApp(decode(params)?),
            descriptor::PICK_DIRECTORY => NativeCall::PickDirectory(decode(params)?),
            descriptor::PICK_FILE => NativeCall::PickFile(decode(params)?),
            descriptor::QUIT => NativeCall::Quit,
            descriptor::SHOW_MESSAGE_BOX => NativeCall::ShowMessageBox(decode(params)?),
            descriptor::UNSUBSCRIBE => NativeCall::Unsubscribe(decode(params)?),
            other => return Err(format!("unknown method '{}'", other)),
        };
        Ok(call)
    }

    pub fn method(&self) -> &'static str {
        match self {
            NativeCall::TryNut => descriptor::TRY_NUT,
            NativeCall::ExecuteZxScript(_) => descriptor::EXECUTE_ZX_SCRIPT,
            NativeCall::Open(_) => descriptor::OPEN,
            NativeCall::OpenInEditor(_) => descriptor::OPEN_IN_EDITOR,
            NativeCall::OpenInGitGuiApp(_) => descriptor::OPEN_IN_GIT_GUI_APP,
            NativeCall::PickDirectory(_) => descriptor::PICK_DIRECTORY,
            NativeCall::PickFile(_) => descriptor::PICK_FILE,
            NativeCall::Quit => descriptor::QUIT,
            NativeCall::ShowMessageBox(_) => descriptor::SHOW_MESSAGE_BOX,
            NativeCall::Unsubscribe(_) => descriptor::UNSUBSCRIBE,
        }
    }
}

/// Body of a response line, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseBody {
    Result { value: Value },
    Error { error: String },
    Next { value: WorkerMessage },
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl RpcResponse {
    pub fn result(id: u64, value: Value) -> Self {
        Self {
            id,
            body: ResponseBody::Result { value },
        }
    }

    pub fn error(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            body: ResponseBody::Error {
                error: error.into(),
            },
        }
    }

    pub fn next(id: u64, value: WorkerMessage) -> Self {
        Self {
            id,
            body: ResponseBody::Next { value },
        }
    }

    pub fn complete(id: u64) -> Self {
        Self {
            id,
            body: ResponseBody::Complete,
        }
    }
}
