//! The native channel's method table

use serde::{Deserialize, Serialize};

/// Channel name the native service is exposed on
pub const NATIVE_CHANNEL: &str = "NativeChannel";

/// How a method's result travels back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProxyKind {
    /// One `result` or `error` response
    Function,
    /// Zero or more `next` events, then `complete` or `error`
    FunctionStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub kind: ProxyKind,
}

impl MethodDescriptor {
    const fn function(name: &'static str) -> Self {
        Self {
            name,
            kind: ProxyKind::Function,
        }
    }

    const fn stream(name: &'static str) -> Self {
        Self {
            name,
            kind: ProxyKind::FunctionStream,
        }
    }
}

pub const TRY_NUT: &str = "tryNut";
pub const EXECUTE_ZX_SCRIPT: &str = "executeZxScript$";
pub const OPEN: &str = "open";
pub const OPEN_IN_EDITOR: &str = "openInEditor";
pub const OPEN_IN_GIT_GUI_APP: &str = "openInGitGuiApp";
pub const PICK_DIRECTORY: &str = "pickDirectory";
pub const PICK_FILE: &str = "pickFile";
pub const QUIT: &str = "quit";
pub const SHOW_MESSAGE_BOX: &str = "showElectronMessageBox";

/// Cancels a running stream; not part of the service surface itself
pub const UNSUBSCRIBE: &str = "unsubscribe";

pub const NATIVE_METHODS: &[MethodDescriptor] = &[
    MethodDescriptor::function(TRY_NUT),
    MethodDescriptor::stream(EXECUTE_ZX_SCRIPT),
    MethodDescriptor::function(OPEN),
    MethodDescriptor::function(OPEN_IN_EDITOR),
    MethodDescriptor::function(OPEN_IN_GIT_GUI_APP),
    MethodDescriptor::function(PICK_DIRECTORY),
    MethodDescriptor::function(PICK_FILE),
    MethodDescriptor::function(QUIT),
    MethodDescriptor::function(SHOW_MESSAGE_BOX),
];

pub fn find_method(name: &str) -> Option<&'static MethodDescriptor> {
    NATIVE_METHODS.iter().find(|m| m.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_table() {
        assert_eq!(NATIVE_METHODS.len(), 9);
        assert_eq!(find_method("executeZxScript$").unwrap().kind, ProxyKind::FunctionStream);
        assert_eq!(find_method("pickFile").unwrap().kind, ProxyKind::Function);
        assert!(find_method("executeZxScript").is_none());
        assert!(find_method(UNSUBSCRIBE).is_none());

        let streams = NATIVE_METHODS
            .iter()
            .filter(|m| m.kind == ProxyKind::FunctionStream)
            .count();
        assert_eq!(streams, 1);
    }

    #[test]
    fn test_descriptor_serializes_for_introspection() {
        let value = serde_json::to_value(NATIVE_METHODS[1]).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name": "executeZxScript$", "kind": "functionStream"})
        );
    }
}
