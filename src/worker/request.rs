//! Script execution requests and runtime selection

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::NativeConfig;
use crate::error::Result;
use crate::paths::find_executable;

/// File name used when the request's name has no usable final component
const FALLBACK_FILE_NAME: &str = "script.mjs";

/// A request to run a script in a worker process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequest {
    /// Name of the script; its extension selects the runtime
    pub file_name: String,
    /// Script body, written to a temp file before execution
    pub file_content: String,
    /// Extra arguments passed to the script
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl ScriptRequest {
    pub fn new(file_name: impl Into<String>, file_content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_content: file_content.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The final path component of `file_name`, so a request can never write
    /// outside its temp directory
    pub fn safe_file_name(&self) -> String {
        Path::new(&self.file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .map(str::to_string)
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
    }

    /// Lowercased extension of the safe file name
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.safe_file_name())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// The interpreter used to run a script file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRuntime {
    pub program: String,
    pub args: Vec<String>,
}

impl ScriptRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Pick the runtime for a request
    ///
    /// A per-extension override from the config wins; otherwise shell and
    /// python scripts get their interpreters and everything else runs on zx.
    pub fn for_request(request: &ScriptRequest, config: &NativeConfig) -> Self {
        let extension = request.extension();

        if let Some(program) = extension
            .as_deref()
            .and_then(|ext| config.runtime_for_extension(ext))
        {
            return Self::new(program);
        }

        match extension.as_deref() {
            Some("sh") => Self::new("sh"),
            Some("bash") => Self::new("bash"),
            Some("py") => Self::new("python3"),
            // mjs/js/ts, and md (zx runs its fenced code blocks)
            _ => Self::new(config.get_zx_program()),
        }
    }

    /// Resolve the program to an absolute path when possible
    pub fn resolve_program(&self) -> String {
        find_executable(&self.program)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }
}

/// A script body written to its own temp directory
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct PreparedScript {
    dir: PathBuf,
    path: PathBuf,
}

impl PreparedScript {
    pub fn write(request: &ScriptRequest) -> Result<Self> {
        let dir = std::env::temp_dir().join(format!("native-service-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir)?;

        let path = dir.join(request.safe_file_name());
        if let Err(e) = fs::write(&path, &request.file_content) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = request.file_content.len(), "Script written");
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PreparedScript {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "Failed to remove script temp dir");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape_is_camel_case() {
        let json = r#"{"fileName":"a.mjs","fileContent":"echo`hi`"}"#;
        let request: ScriptRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request, ScriptRequest::new("a.mjs", "echo`hi`"));

        let back = serde_json::to_string(&request).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_safe_file_name_strips_directories() {
        assert_eq!(ScriptRequest::new("../../etc/passwd", "").safe_file_name(), "passwd");
        assert_eq!(ScriptRequest::new("dir/build.mjs", "").safe_file_name(), "build.mjs");
        assert_eq!(ScriptRequest::new("", "").safe_file_name(), FALLBACK_FILE_NAME);
        assert_eq!(ScriptRequest::new("..", "").safe_file_name(), FALLBACK_FILE_NAME);
    }

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(ScriptRequest::new("RUN.SH", "").extension().as_deref(), Some("sh"));
        assert_eq!(ScriptRequest::new("Makefile", "").extension(), None);
    }

    #[test]
    fn test_runtime_selection_by_extension() {
        let config = NativeConfig::default();
        let runtime =
            |name: &str| ScriptRuntime::for_request(&ScriptRequest::new(name, ""), &config);

        assert_eq!(runtime("a.sh").program, "sh");
        assert_eq!(runtime("a.bash").program, "bash");
        assert_eq!(runtime("a.py").program, "python3");
        assert_eq!(runtime("a.mjs").program, "zx");
        assert_eq!(runtime("a.md").program, "zx");
        assert_eq!(runtime("no-extension").program, "zx");
    }

    #[test]
    fn test_runtime_config_overrides() {
        let mut config = NativeConfig {
            zx_path: Some("/opt/zx".to_string()),
            ..Default::default()
        };
        config.runtimes.insert("sh".to_string(), "dash".to_string());

        let sh = ScriptRuntime::for_request(&ScriptRequest::new("a.sh", ""), &config);
        assert_eq!(sh.program, "dash");
        let mjs = ScriptRuntime::for_request(&ScriptRequest::new("a.mjs", ""), &config);
        assert_eq!(mjs.program, "/opt/zx");
    }

    #[test]
    fn test_prepared_script_is_removed_on_drop() {
        let request = ScriptRequest::new("hello.sh", "echo hello\n");
        let prepared = PreparedScript::write(&request).unwrap();
        let path = prepared.path().to_path_buf();
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo hello\n");
        assert!(path.ends_with("hello.sh"));

        let dir = path.parent().unwrap().to_path_buf();
        drop(prepared);
        assert!(!dir.exists());
    }
}
