//! Script worker spawning and supervision
//!
//! Each execution gets:
//! - its own temp directory holding the script file
//! - a child process in a fresh process group with piped stdout/stderr
//! - a supervisor thread that emits `start`, waits for the exit status, kills
//!   whatever is left in the process group, drains two line-reader threads and
//!   emits exactly one of `ended`/`error`

use async_channel::Sender;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use super::message::{LogStream, WorkerMessage};
use super::process::ProcessHandle;
use super::request::{PreparedScript, ScriptRequest, ScriptRuntime};
use super::stderr_buffer::StderrBuffer;
use super::stream::{WorkerControl, WorkerStream};
use crate::config::NativeConfig;
use crate::error::Result;
use crate::logging;
use crate::process_manager::{ProcessManager, PROCESS_MANAGER};

/// Number of stderr lines quoted in an `error` diagnostic
const DIAGNOSTIC_STDERR_LINES: usize = 20;

/// How long the readers get to drain the pipes once the process group is gone
///
/// A descendant that left the group (setsid) can keep a pipe open forever.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything the supervisor thread needs, resolved up front
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub runtime: ScriptRuntime,
    pub terminate_grace: Duration,
    pub stderr_max_lines: usize,
    pub stderr_max_bytes: usize,
    /// Where the worker's PID is tracked while it runs
    pub processes: &'static ProcessManager,
}

impl WorkerOptions {
    pub fn from_config(request: &ScriptRequest, config: &NativeConfig) -> Self {
        Self {
            runtime: ScriptRuntime::for_request(request, config),
            terminate_grace: config.get_terminate_grace(),
            stderr_max_lines: config.get_stderr_max_lines(),
            stderr_max_bytes: config.get_stderr_max_bytes(),
            processes: &PROCESS_MANAGER,
        }
    }

    pub fn with_process_manager(mut self, processes: &'static ProcessManager) -> Self {
        self.processes = processes;
        self
    }
}

/// Start a worker for `request` using runtime settings from `config`
pub fn execute_script(request: ScriptRequest, config: &NativeConfig) -> Result<WorkerStream> {
    let options = WorkerOptions::from_config(&request, config);
    execute_script_with(request, options)
}

/// Start a worker with explicit options
///
/// Only temp-file preparation and thread creation fail here; anything that
/// goes wrong later, including a missing runtime, arrives as an `error`
/// message after `start`.
#[instrument(skip_all, fields(file_name = %request.file_name))]
pub fn execute_script_with(request: ScriptRequest, options: WorkerOptions) -> Result<WorkerStream> {
    let prepared = PreparedScript::write(&request)?;
    let file_name = request.safe_file_name();

    let (tx, rx) = async_channel::unbounded();
    let control = Arc::new(WorkerControl::new(&file_name, rx));
    let stream = WorkerStream::new(control.clone());

    thread::Builder::new()
        .name(format!("worker-{}", file_name))
        .spawn(move || supervise(request, prepared, options, control, tx))?;

    Ok(stream)
}

fn supervise(
    request: ScriptRequest,
    prepared: PreparedScript,
    options: WorkerOptions,
    control: Arc<WorkerControl>,
    tx: Sender<WorkerMessage>,
) {
    let start = Instant::now();
    let file_name = request.safe_file_name();

    if tx.send_blocking(WorkerMessage::start()).is_err() || control.is_cancelled() {
        debug!(file_name = %file_name, "Cancelled before spawn");
        return;
    }
    logging::log_worker_event(&file_name, "start", None, true);

    let outcome = run_to_exit(&request, &prepared, &options, &control, &tx, &file_name);

    if control.is_cancelled() {
        logging::log_worker_event(
            &file_name,
            "cancelled",
            Some(start.elapsed().as_millis() as u64),
            false,
        );
        return;
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    let terminal = match outcome {
        Ok(()) => {
            logging::log_worker_event(&file_name, "ended", Some(duration_ms), true);
            WorkerMessage::ended()
        }
        Err(diagnostic) => {
            logging::log_worker_event(&file_name, "error", Some(duration_ms), false);
            WorkerMessage::error(diagnostic)
        }
    };

    if tx.send_blocking(terminal).is_err() {
        debug!(file_name = %file_name, "Subscriber gone before terminal message");
    }
    drop(prepared);
}

/// Spawn the script and wait for it; `Err` carries the diagnostic text
fn run_to_exit(
    request: &ScriptRequest,
    prepared: &PreparedScript,
    options: &WorkerOptions,
    control: &WorkerControl,
    tx: &Sender<WorkerMessage>,
    file_name: &str,
) -> std::result::Result<(), String> {
    let program = options.runtime.resolve_program();

    let mut command = Command::new(&program);
    command
        .args(&options.runtime.args)
        .arg(prepared.path())
        .args(&request.args)
        .envs(&request.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(cwd) = &request.cwd {
        command.current_dir(cwd);
    }

    // process_group(0) makes the child's PID its PGID so cancel can kill children too
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|e| {
        error!(error = %e, program = %program, "Worker spawn failed");
        format!("Failed to spawn '{}' for {}: {}", program, file_name, e)
    })?;

    let pid = child.id();
    info!(pid, program = %program, file_name, "Worker process spawned");
    control.attach_process(ProcessHandle::new(
        pid,
        file_name,
        options.terminate_grace,
        options.processes,
    ));

    let stderr_buffer = StderrBuffer::new(options.stderr_max_lines, options.stderr_max_bytes);

    let stdout_reader = child
        .stdout
        .take()
        .map(|out| spawn_line_reader(out, LogStream::Stdout, tx.clone(), None));
    let stderr_reader = child.stderr.take().map(|err| {
        spawn_line_reader(err, LogStream::Stderr, tx.clone(), Some(stderr_buffer.clone()))
    });

    let waited = child.wait();

    // Background jobs inherit the pipes; killing the rest of the group lets the readers hit EOF
    drop(control.detach_process());

    // Both readers must finish before the terminal message so nothing can follow it
    let readers: Vec<JoinHandle<()>> = [stdout_reader, stderr_reader]
        .into_iter()
        .flatten()
        .collect();
    join_readers(pid, readers, READER_DRAIN_TIMEOUT);

    let status = waited.map_err(|e| {
        error!(pid, error = %e, "Failed to wait for worker");
        format!("Failed to wait for {}: {}", file_name, e)
    })?;

    if status.success() {
        debug!(pid, "Worker exited successfully");
        return Ok(());
    }

    let mut diagnostic = format!("{} {}", file_name, describe_exit(&status));
    let stderr_tail = stderr_buffer.tail(DIAGNOSTIC_STDERR_LINES);
    if !stderr_tail.is_empty() {
        diagnostic.push_str(": ");
        diagnostic.push_str(&stderr_tail);
    }
    Err(diagnostic)
}

/// Join the line readers, giving up on any still blocked after `timeout`
///
/// An abandoned reader can only send into a channel the subscriber closes at
/// the terminal message, so nothing it reads later is delivered.
fn join_readers(pid: u32, readers: Vec<JoinHandle<()>>, timeout: Duration) {
    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    let deadline = Instant::now() + timeout;
    while readers.iter().any(|r| !r.is_finished()) && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
    }

    for reader in readers {
        if !reader.is_finished() {
            warn!(pid, "Worker pipe still open after the process group exited, not waiting");
            continue;
        }
        if reader.join().is_err() {
            warn!(pid, "Worker line reader panicked");
        }
    }
}

/// Forward lines from a pipe as log messages until EOF or the subscriber leaves
fn spawn_line_reader<R: Read + Send + 'static>(
    pipe: R,
    stream: LogStream,
    tx: Sender<WorkerMessage>,
    tee: Option<StderrBuffer>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = trim_line_ending(&buf);
                    if let Some(tee) = &tee {
                        tee.push_line(line.clone());
                    }
                    let msg = match stream {
                        LogStream::Stdout => WorkerMessage::stdout(line),
                        LogStream::Stderr => WorkerMessage::stderr(line),
                    };
                    if tx.send_blocking(msg).is_err() {
                        debug!(stream = stream.as_str(), "Subscriber gone, reader stopping");
                        break;
                    }
                }
                Err(e) => {
                    warn!(stream = stream.as_str(), error = %e, "Worker pipe read error");
                    break;
                }
            }
        }
    })
}

fn trim_line_ending(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && raw[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn describe_exit(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with code {}", code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("was terminated by signal {}", signal);
        }
    }

    "exited abnormally".to_string()
}
