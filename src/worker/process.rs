//! Process-group ownership for worker processes

use std::time::Duration;
#[cfg(unix)]
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::process_manager::ProcessManager;

#[cfg(unix)]
mod unix_process {
    use libc::{c_int, pid_t, ESRCH};

    /// Send a signal to a process group (negative PID targets the group)
    pub fn kill_process_group(pgid: u32, signal: c_int) -> Result<(), &'static str> {
        // Safety: kill() is a plain syscall with no memory safety concerns
        let rc = unsafe { libc::kill(-(pgid as pid_t), signal) };
        if rc == 0 {
            Ok(())
        } else {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            match errno {
                libc::ESRCH => Err("No such process group"),
                libc::EPERM => Err("Permission denied"),
                libc::EINVAL => Err("Invalid signal"),
                _ => Err("Unknown error"),
            }
        }
    }

    /// Signal 0 checks existence without delivering anything.
    /// EPERM still means the group exists.
    pub fn process_group_alive(pgid: u32) -> bool {
        // Safety: kill() with signal 0 only checks existence
        let rc = unsafe { libc::kill(-(pgid as pid_t), 0) };
        if rc == 0 {
            true
        } else {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            errno != ESRCH
        }
    }
}

#[cfg(unix)]
pub use unix_process::{kill_process_group, process_group_alive};

/// Owns a worker's process group for its lifetime
///
/// The worker is spawned with `process_group(0)`, so its PID is also the PGID
/// and killing the group takes any children it started along with it.
/// Dropping the handle unregisters the worker and kills whatever is left.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    file_name: String,
    terminate_grace: Duration,
    processes: &'static ProcessManager,
    killed: bool,
}

impl ProcessHandle {
    /// Take ownership of `pid` and track it in `processes` until dropped
    pub fn new(
        pid: u32,
        file_name: &str,
        terminate_grace: Duration,
        processes: &'static ProcessManager,
    ) -> Self {
        processes.register_process(pid, file_name);
        Self {
            pid,
            file_name: file_name.to_string(),
            terminate_grace,
            processes,
            killed: false,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Kill the process group: SIGTERM, wait out the grace period, then SIGKILL
    ///
    /// Calling this more than once is a no-op.
    pub fn kill(&mut self) {
        const POLL_INTERVAL: Duration = Duration::from_millis(25);

        if self.killed {
            return;
        }
        self.killed = true;

        #[cfg(unix)]
        {
            let pgid = self.pid;

            match kill_process_group(pgid, libc::SIGTERM) {
                Ok(()) => debug!(pgid, file_name = %self.file_name, "SIGTERM sent"),
                Err("No such process group") => {
                    debug!(pgid, "Process group already exited");
                    return;
                }
                Err(e) => warn!(pgid, error = e, "SIGTERM failed, escalating"),
            }

            let start = Instant::now();
            while start.elapsed() < self.terminate_grace {
                // The group, not just the leader: children may outlive it
                if !process_group_alive(pgid) {
                    debug!(pgid, "Process group exited after SIGTERM");
                    return;
                }
                std::thread::sleep(POLL_INTERVAL);
            }

            match kill_process_group(pgid, libc::SIGKILL) {
                Ok(()) => info!(
                    pgid,
                    grace_ms = self.terminate_grace.as_millis() as u64,
                    "Process group ignored SIGTERM, sent SIGKILL"
                ),
                Err("No such process group") => {
                    debug!(pgid, "Process group exited just before SIGKILL")
                }
                Err(e) => warn!(pgid, error = e, "SIGKILL failed"),
            }
        }

        #[cfg(windows)]
        {
            let result = std::process::Command::new("taskkill")
                .args(["/PID", &self.pid.to_string(), "/T", "/F"])
                .output();
            if let Err(e) = result {
                warn!(pid = self.pid, error = %e, "taskkill failed");
            }
        }
    }

    #[cfg(unix)]
    pub fn is_alive(&self) -> bool {
        process_group_alive(self.pid)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.processes.unregister_process(self.pid);
        self.kill();
    }
}
