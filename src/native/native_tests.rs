use super::*;
use crate::apps::LaunchCommand;
use crate::config::NativeConfig;
use crate::error::NativeError;
use crate::host::Host;
use crate::process_manager::{test_process_manager, ProcessManager};
use crate::worker::WorkerMessage;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Records every host call; dialogs return canned answers
#[derive(Default)]
struct FakeHost {
    calls: Mutex<Vec<String>>,
    installed: Vec<&'static str>,
    picked: Vec<PathBuf>,
    automation_error: Option<&'static str>,
    launches: Mutex<Vec<(LaunchCommand, PathBuf)>>,
    exit_code: Mutex<Option<i32>>,
}

impl FakeHost {
    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Host for FakeHost {
    fn probe_automation(&self) -> crate::error::Result<()> {
        self.record("probe".to_string());
        match self.automation_error {
            Some(msg) => Err(NativeError::Automation(msg.to_string())),
            None => Ok(()),
        }
    }

    fn open_uri(&self, uri: &str) -> crate::error::Result<()> {
        self.record(format!("open_uri {}", uri));
        Ok(())
    }

    fn reveal_path(&self, path: &Path) -> crate::error::Result<()> {
        self.record(format!("reveal {}", path.display()));
        Ok(())
    }

    fn is_installed(&self, program: &str) -> bool {
        self.installed.iter().any(|p| *p == program)
    }

    fn launch(&self, command: &LaunchCommand, target: &Path) -> crate::error::Result<()> {
        self.launches
            .lock()
            .push((command.clone(), target.to_path_buf()));
        Ok(())
    }

    fn pick_directory(&self, default_path: Option<&Path>) -> crate::error::Result<Vec<PathBuf>> {
        self.record(format!(
            "pick_directory {}",
            default_path.map(|p| p.display().to_string()).unwrap_or_default()
        ));
        Ok(self.picked.clone())
    }

    fn pick_files(&self, filters: &[FileFilter]) -> crate::error::Result<Vec<PathBuf>> {
        self.record(format!("pick_files {}", filters.len()));
        Ok(self.picked.clone())
    }

    fn show_message_box(
        &self,
        title: &str,
        message: &str,
        kind: MessageBoxKind,
    ) -> crate::error::Result<()> {
        self.record(format!("message_box {} {} {}", title, kind.as_str(), message));
        Ok(())
    }

    fn exit(&self, code: i32) {
        *self.exit_code.lock() = Some(code);
    }
}

fn service(host: FakeHost) -> DesktopNativeService<FakeHost> {
    DesktopNativeService::new(host, NativeConfig::default())
        .with_process_manager(test_process_manager())
}

#[test]
fn test_try_nut_propagates_probe_failure() {
    assert!(service(FakeHost::default()).try_nut().is_ok());

    let failing = service(FakeHost {
        automation_error: Some("xdotool: command not found"),
        ..Default::default()
    });
    let err = failing.try_nut().unwrap_err();
    assert!(matches!(err, NativeError::Automation(_)));
    assert_eq!(failing.host().calls(), vec!["probe"]);
}

#[test]
fn test_open_url_goes_to_system_handler() {
    let svc = service(FakeHost::default());
    svc.open("https://example.com/a?b=c", false).unwrap();
    assert_eq!(svc.host().calls(), vec!["open_uri https://example.com/a?b=c"]);
}

#[test]
fn test_open_directory_reveals_in_file_manager() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(FakeHost::default());
    svc.open(&dir.path().to_string_lossy(), true).unwrap();
    assert_eq!(
        svc.host().calls(),
        vec![format!("reveal {}", dir.path().display())]
    );
}

#[test]
fn test_open_file_uri_resolves_local_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("note.md");
    std::fs::write(&file, "# hi").unwrap();

    let svc = service(FakeHost::default());
    svc.open(&format!("file://{}", file.display()), false).unwrap();
    assert_eq!(svc.host().calls(), vec![format!("open_uri {}", file.display())]);
}

#[test]
fn test_open_rejects_empty_and_missing() {
    let svc = service(FakeHost::default());
    assert!(matches!(svc.open("  ", false), Err(NativeError::Open { .. })));
    assert!(matches!(
        svc.open("/definitely/not/here/native-service", true),
        Err(NativeError::Open { .. })
    ));
    assert!(svc.host().calls().is_empty());
}

#[test]
fn test_open_in_editor_uses_requested_app() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(FakeHost {
        installed: vec!["code", "zed"],
        ..Default::default()
    });

    svc.open_in_editor(dir.path(), Some("ZED")).unwrap();

    let launches = svc.host().launches.lock().clone();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].0.program, "zed");
    assert_eq!(launches[0].1, dir.path());
}

#[test]
fn test_open_in_editor_prefers_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = NativeConfig {
        editor: Some("cursor".to_string()),
        ..Default::default()
    };
    let svc = DesktopNativeService::new(
        FakeHost {
            installed: vec!["code", "cursor"],
            ..Default::default()
        },
        config,
    );

    svc.open_in_editor(dir.path(), None).unwrap();
    assert_eq!(svc.host().launches.lock()[0].0.program, "cursor");
}

#[test]
fn test_open_in_editor_missing_file() {
    let svc = service(FakeHost {
        installed: vec!["code"],
        ..Default::default()
    });
    let err = svc
        .open_in_editor(Path::new("/no/such/file.md"), None)
        .unwrap_err();
    assert!(matches!(err, NativeError::FileNotFound(_)));
    assert!(svc.host().launches.lock().is_empty());
}

#[test]
fn test_open_in_git_gui_app_falls_back_to_installed() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(FakeHost {
        installed: vec!["gitg"],
        ..Default::default()
    });

    svc.open_in_git_gui_app(dir.path(), None).unwrap();
    assert_eq!(svc.host().launches.lock()[0].0.program, "gitg");

    let err = svc
        .open_in_git_gui_app(dir.path(), Some("GitKraken"))
        .unwrap_err();
    assert!(matches!(
        err,
        NativeError::AppNotFound { kind: "git GUI app", requested: Some(_) }
    ));
}

#[test]
fn test_pick_directory_passes_existing_default_only() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(FakeHost {
        picked: vec![dir.path().to_path_buf()],
        ..Default::default()
    });

    let picked = svc.pick_directory(Some(dir.path())).unwrap();
    assert_eq!(picked, vec![dir.path().to_path_buf()]);

    svc.pick_directory(Some(Path::new("/no/such/dir"))).unwrap();
    assert_eq!(
        svc.host().calls(),
        vec![
            format!("pick_directory {}", dir.path().display()),
            "pick_directory ".to_string(),
        ]
    );
}

#[test]
fn test_dismissed_picker_is_empty_not_error() {
    let svc = service(FakeHost::default());
    let filters = vec![FileFilter::new("Markdown", ["md"])];
    assert!(svc.pick_file(&filters).unwrap().is_empty());
    assert_eq!(svc.host().calls(), vec!["pick_files 1"]);
}

#[test]
fn test_message_box_defaults_to_main_window() {
    let svc = service(FakeHost::default());
    svc.show_message_box("Saved", MessageBoxKind::Info, None)
        .unwrap();
    assert_eq!(svc.host().calls(), vec!["message_box Main info Saved"]);
}

#[test]
fn test_message_box_requires_open_window() {
    let svc = service(FakeHost::default());
    let err = svc
        .show_message_box("hi", MessageBoxKind::Warning, Some(WindowName::Preferences))
        .unwrap_err();
    assert!(matches!(err, NativeError::WindowNotFound(ref w) if w == "preferences"));

    svc.windows().register(WindowName::Preferences);
    svc.show_message_box("hi", MessageBoxKind::Warning, Some(WindowName::Preferences))
        .unwrap();
    assert_eq!(svc.host().calls(), vec!["message_box Preferences warning hi"]);
}

#[test]
fn test_quit_kills_workers_and_exits() {
    let dir = tempfile::tempdir().unwrap();
    let manager: &'static ProcessManager = Box::leak(Box::new(ProcessManager::with_paths(
        dir.path().join("main.pid"),
        dir.path().join("workers.json"),
    )));
    manager.register_process(4_194_402, "fake.sh");

    let svc = service(FakeHost::default()).with_process_manager(manager);
    svc.quit();

    assert_eq!(manager.active_count(), 0);
    assert_eq!(*svc.host().exit_code.lock(), Some(0));
}

#[cfg(unix)]
#[test]
fn test_execute_zx_script_tracks_worker_in_service_table() {
    let dir = tempfile::tempdir().unwrap();
    let manager: &'static ProcessManager = Box::leak(Box::new(ProcessManager::with_paths(
        dir.path().join("main.pid"),
        dir.path().join("workers.json"),
    )));
    let svc = service(FakeHost::default()).with_process_manager(manager);

    let mut stream = svc
        .execute_zx_script(crate::worker::ScriptRequest::new("tracked.sh", "echo up\nsleep 5\n"))
        .unwrap();
    assert_eq!(stream.next(), Some(WorkerMessage::start()));
    assert_eq!(stream.next(), Some(WorkerMessage::stdout("up")));
    assert_eq!(manager.active_count(), 1);

    stream.cancel();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(3);
    while manager.active_count() > 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(25));
    }
    assert_eq!(manager.active_count(), 0);
}

#[cfg(unix)]
#[test]
fn test_execute_zx_script_streams_worker_output() {
    let svc = service(FakeHost::default());
    let messages: Vec<_> = svc
        .execute_zx_script(crate::worker::ScriptRequest::new("svc.sh", "echo via-service\n"))
        .unwrap()
        .collect();
    assert_eq!(
        messages,
        vec![
            WorkerMessage::start(),
            WorkerMessage::stdout("via-service"),
            WorkerMessage::ended(),
        ]
    );
}
