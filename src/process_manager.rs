//! Process Manager Module
//!
//! Centralized tracking of script worker processes.
//!
//! - PID file at ~/.native-service/native-service.pid for the host process
//! - Active worker PIDs file at ~/.native-service/worker-pids.json
//! - Thread-safe registration/unregistration
//! - Orphan detection on startup
//! - Bulk kill on quit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

use parking_lot::RwLock;
use sysinfo::{Pid, System};
use tracing::{debug, info, warn};

/// Global singleton process manager
pub static PROCESS_MANAGER: LazyLock<ProcessManager> = LazyLock::new(ProcessManager::new);

/// Information about a tracked worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerProcessInfo {
    /// Process ID (also the process group ID)
    pub pid: u32,
    /// Script file name the worker is running
    pub file_name: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ProcessManager {
    active_processes: RwLock<HashMap<u32, WorkerProcessInfo>>,
    main_pid_path: PathBuf,
    active_pids_path: PathBuf,
}

impl ProcessManager {
    /// Create a new ProcessManager with default paths
    pub fn new() -> Self {
        let state_dir = dirs::home_dir()
            .map(|h| h.join(".native-service"))
            .unwrap_or_else(|| std::env::temp_dir().join(".native-service"));

        Self::with_paths(
            state_dir.join("native-service.pid"),
            state_dir.join("worker-pids.json"),
        )
    }

    pub fn with_paths(main_pid_path: PathBuf, active_pids_path: PathBuf) -> Self {
        Self {
            active_processes: RwLock::new(HashMap::new()),
            main_pid_path,
            active_pids_path,
        }
    }

    /// Write the host PID to disk, overwriting any previous file
    pub fn write_main_pid(&self) -> std::io::Result<()> {
        let pid = std::process::id();
        if let Some(parent) = self.main_pid_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&self.main_pid_path)?;
        write!(file, "{}", pid)?;

        debug!(pid, path = %self.main_pid_path.display(), "Main PID written");
        Ok(())
    }

    /// Remove the host PID file on clean shutdown
    pub fn remove_main_pid(&self) {
        if self.main_pid_path.exists() {
            if let Err(e) = fs::remove_file(&self.main_pid_path) {
                warn!(error = %e, "Failed to remove main PID file");
            }
        }
    }

    pub fn read_main_pid(&self) -> Option<u32> {
        fs::read_to_string(&self.main_pid_path)
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// True if there is a PID file but that process is no longer running
    pub fn is_main_pid_stale(&self) -> bool {
        match self.read_main_pid() {
            Some(pid) => !self.is_process_running(pid),
            None => false,
        }
    }

    /// Start tracking a worker process and persist the table
    pub fn register_process(&self, pid: u32, file_name: &str) {
        let info = WorkerProcessInfo {
            pid,
            file_name: file_name.to_string(),
            started_at: Utc::now(),
        };

        debug!(pid, file_name, "Registering worker process");
        self.active_processes.write().insert(pid, info);

        if let Err(e) = self.persist_active_pids() {
            warn!(error = %e, "Failed to persist active worker PIDs");
        }
    }

    pub fn unregister_process(&self, pid: u32) {
        debug!(pid, "Unregistering worker process");
        self.active_processes.write().remove(&pid);

        if let Err(e) = self.persist_active_pids() {
            warn!(error = %e, "Failed to persist active worker PIDs");
        }
    }

    pub fn get_active_processes(&self) -> Vec<WorkerProcessInfo> {
        self.active_processes.read().values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active_processes.read().len()
    }

    /// Kill every tracked worker process group and clear tracking
    pub fn kill_all_processes(&self) {
        let processes: Vec<WorkerProcessInfo> = self.get_active_processes();

        if processes.is_empty() {
            debug!("No active worker processes to kill");
            return;
        }

        info!(count = processes.len(), "Killing active worker processes");
        for info in &processes {
            self.kill_process(info.pid);
        }

        self.active_processes.write().clear();

        if self.active_pids_path.exists() {
            if let Err(e) = fs::remove_file(&self.active_pids_path) {
                warn!(error = %e, "Failed to remove worker PIDs file");
            }
        }
    }

    /// Send SIGKILL to a worker's process group
    pub fn kill_process(&self, pid: u32) {
        #[cfg(unix)]
        {
            match crate::worker::kill_process_group(pid, libc::SIGKILL) {
                Ok(()) => info!(pid, "Killed worker process group"),
                Err(e) => debug!(pid, error = e, "Worker process group not killed"),
            }
        }

        #[cfg(not(unix))]
        {
            warn!(pid, "Non-Unix platform: cannot kill worker process group");
        }
    }

    pub fn is_process_running(&self, pid: u32) -> bool {
        let mut system = System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);
        system.process(Pid::from_u32(pid)).is_some()
    }

    /// Kill workers left behind by a previous run that crashed
    ///
    /// Returns the number of orphans killed.
    pub fn cleanup_orphans(&self) -> usize {
        let orphans = self.load_persisted_pids();
        if orphans.is_empty() {
            return 0;
        }

        let mut killed_count = 0;
        for info in &orphans {
            if self.is_process_running(info.pid) {
                info!(pid = info.pid, file_name = %info.file_name, "Killing orphaned worker");
                self.kill_process(info.pid);
                killed_count += 1;
            }
        }

        if self.active_pids_path.exists() {
            if let Err(e) = fs::remove_file(&self.active_pids_path) {
                warn!(error = %e, "Failed to remove orphan PIDs file");
            }
        }

        killed_count
    }

    fn persist_active_pids(&self) -> std::io::Result<()> {
        let processes = self.get_active_processes();

        if let Some(parent) = self.active_pids_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&processes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.active_pids_path)?;

        file.write_all(json.as_bytes())?;
        Ok(())
    }

    fn load_persisted_pids(&self) -> Vec<WorkerProcessInfo> {
        let contents = match fs::read_to_string(&self.active_pids_path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str(&contents) {
            Ok(pids) => pids,
            Err(e) => {
                warn!(error = %e, "Failed to parse worker PIDs JSON");
                Vec::new()
            }
        }
    }
}

/// Process table for tests, kept under the temp dir instead of the home directory
#[cfg(test)]
pub(crate) fn test_process_manager() -> &'static ProcessManager {
    static TEST_PROCESSES: LazyLock<ProcessManager> = LazyLock::new(|| {
        let dir = std::env::temp_dir().join(format!("native-service-test-{}", std::process::id()));
        ProcessManager::with_paths(dir.join("native-service.pid"), dir.join("worker-pids.json"))
    });
    &TEST_PROCESSES
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Above the default Linux pid_max, so never a live process
    const FAKE_PID_A: u32 = 4_194_400;
    const FAKE_PID_B: u32 = 4_194_401;

    fn create_test_manager() -> (ProcessManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let manager = ProcessManager::with_paths(
            temp_dir.path().join("native-service.pid"),
            temp_dir.path().join("worker-pids.json"),
        );
        (manager, temp_dir)
    }

    #[test]
    fn test_write_and_read_main_pid() {
        let (manager, _temp_dir) = create_test_manager();
        manager.write_main_pid().unwrap();
        assert_eq!(manager.read_main_pid(), Some(std::process::id()));

        manager.remove_main_pid();
        assert!(!manager.main_pid_path.exists());
        assert_eq!(manager.read_main_pid(), None);
    }

    #[test]
    fn test_register_and_unregister_process() {
        let (manager, _temp_dir) = create_test_manager();

        manager.register_process(FAKE_PID_A, "build.mjs");
        let active = manager.get_active_processes();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].pid, FAKE_PID_A);
        assert_eq!(active[0].file_name, "build.mjs");
        assert!(manager.active_pids_path.exists());

        manager.unregister_process(FAKE_PID_A);
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_persisted_table_round_trips() {
        let (manager, _temp_dir) = create_test_manager();
        manager.register_process(FAKE_PID_A, "a.mjs");
        manager.register_process(FAKE_PID_B, "b.sh");

        let pids: Vec<u32> = manager.load_persisted_pids().iter().map(|p| p.pid).collect();
        assert_eq!(pids.len(), 2);
        assert!(pids.contains(&FAKE_PID_A));
        assert!(pids.contains(&FAKE_PID_B));

        let raw = fs::read_to_string(&manager.active_pids_path).unwrap();
        assert!(raw.contains("\"fileName\""));
        assert!(raw.contains("\"startedAt\""));
    }

    #[test]
    fn test_kill_all_clears_tracking() {
        let (manager, _temp_dir) = create_test_manager();
        manager.register_process(FAKE_PID_A, "a.mjs");
        manager.register_process(FAKE_PID_B, "b.mjs");

        manager.kill_all_processes();

        assert_eq!(manager.active_count(), 0);
        assert!(!manager.active_pids_path.exists());
    }

    #[test]
    fn test_is_process_running() {
        let (manager, _temp_dir) = create_test_manager();
        assert!(manager.is_process_running(std::process::id()));
        assert!(!manager.is_process_running(FAKE_PID_A));
    }

    #[test]
    fn test_cleanup_orphans_skips_dead_pids_and_clears_file() {
        let (manager, _temp_dir) = create_test_manager();
        assert_eq!(manager.cleanup_orphans(), 0);

        manager.register_process(FAKE_PID_A, "gone.mjs");
        assert_eq!(manager.cleanup_orphans(), 0);
        assert!(!manager.active_pids_path.exists());
    }

    #[test]
    fn test_main_pid_stale_detection() {
        let (manager, _temp_dir) = create_test_manager();
        assert!(!manager.is_main_pid_stale());

        manager.write_main_pid().unwrap();
        assert!(!manager.is_main_pid_stale());

        fs::write(&manager.main_pid_path, FAKE_PID_A.to_string()).unwrap();
        assert!(manager.is_main_pid_stale());
    }
}
