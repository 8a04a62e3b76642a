//! Subscriber side of a worker execution
//!
//! A `WorkerStream` is the single subscriber of one execution. It enforces the
//! protocol as seen by the caller: nothing before `start`, nothing after the
//! terminal message, nothing after `cancel()`.

use async_channel::Receiver;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

use super::message::{ControlAction, WorkerMessage};
use super::process::ProcessHandle;
use crate::error::NativeError;

/// Lifecycle of one execution as observed by its subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkerState::Completed | WorkerState::Failed | WorkerState::Cancelled
        )
    }
}

/// State shared between the subscriber, cancel handles and the supervisor
#[derive(Debug)]
pub(crate) struct WorkerControl {
    file_name: String,
    cancelled: AtomicBool,
    process: Mutex<Option<ProcessHandle>>,
    receiver: Receiver<WorkerMessage>,
}

impl WorkerControl {
    pub(crate) fn new(file_name: &str, receiver: Receiver<WorkerMessage>) -> Self {
        Self {
            file_name: file_name.to_string(),
            cancelled: AtomicBool::new(false),
            process: Mutex::new(None),
            receiver,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Hand the spawned process to the control block
    ///
    /// If cancellation won the race the process is killed right away.
    pub(crate) fn attach_process(&self, handle: ProcessHandle) {
        let mut slot = self.process.lock();
        *slot = Some(handle);
        if self.is_cancelled() {
            if let Some(mut handle) = slot.take() {
                drop(slot);
                handle.kill();
            }
        }
    }

    pub(crate) fn detach_process(&self) -> Option<ProcessHandle> {
        self.process.lock().take()
    }

    /// Returns false if the execution was already cancelled
    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }

        debug!(file_name = %self.file_name, "Cancelling worker");
        self.receiver.close();

        // Killing waits out the SIGTERM grace period, so keep it off the caller's thread
        if let Some(mut handle) = self.process.lock().take() {
            let spawned = thread::Builder::new()
                .name("worker-kill".to_string())
                .spawn(move || handle.kill());
            if let Err(e) = spawned {
                // The closure, and the handle with it, was dropped; Drop kills synchronously
                warn!(error = %e, "Failed to spawn kill thread");
            }
        }
        true
    }
}

/// Cancels an execution from any thread
#[derive(Debug, Clone)]
pub struct CancelHandle {
    control: Arc<WorkerControl>,
}

impl CancelHandle {
    /// Idempotent; returns true only for the call that cancelled
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    /// True when both handles control the same execution
    pub fn same_execution(&self, other: &CancelHandle) -> bool {
        Arc::ptr_eq(&self.control, &other.control)
    }
}

enum Step {
    Deliver(WorkerMessage),
    Skip,
    End,
}

/// Ordered, finite stream of messages from one worker execution
///
/// Iterating blocks the current thread; `next_message` is the async variant.
/// The stream is single-subscriber and cannot be cloned or replayed. Dropping
/// it before the terminal message cancels the execution.
#[derive(Debug)]
pub struct WorkerStream {
    receiver: Receiver<WorkerMessage>,
    control: Arc<WorkerControl>,
    state: WorkerState,
}

impl WorkerStream {
    pub(crate) fn new(control: Arc<WorkerControl>) -> Self {
        Self {
            receiver: control.receiver.clone(),
            control,
            state: WorkerState::NotStarted,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Stop delivery and kill the worker process (best effort, asynchronous)
    pub fn cancel(&mut self) {
        self.control.cancel();
        if !self.state.is_terminal() {
            self.state = WorkerState::Cancelled;
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            control: self.control.clone(),
        }
    }

    /// Blocking receive of the next message
    pub fn next_blocking(&mut self) -> Option<WorkerMessage> {
        loop {
            if self.state.is_terminal() {
                return None;
            }
            let received = self.receiver.recv_blocking().ok();
            match self.accept(received) {
                Step::Deliver(msg) => return Some(msg),
                Step::Skip => continue,
                Step::End => return None,
            }
        }
    }

    /// Async receive of the next message
    pub async fn next_message(&mut self) -> Option<WorkerMessage> {
        loop {
            if self.state.is_terminal() {
                return None;
            }
            let received = self.receiver.recv().await.ok();
            match self.accept(received) {
                Step::Deliver(msg) => return Some(msg),
                Step::Skip => continue,
                Step::End => return None,
            }
        }
    }

    /// Project the stream onto its output text
    pub fn into_output(self) -> ScriptOutput {
        ScriptOutput { stream: self }
    }

    fn accept(&mut self, received: Option<WorkerMessage>) -> Step {
        if self.control.is_cancelled() {
            self.state = WorkerState::Cancelled;
            return Step::End;
        }

        let msg = match received {
            Some(msg) => msg,
            None => {
                // The supervisor always sends a terminal message before
                // dropping its sender; reaching this means it died.
                return match self.state {
                    WorkerState::Running => {
                        self.state = WorkerState::Failed;
                        Step::Deliver(WorkerMessage::error(format!(
                            "{} worker stopped without reporting a result",
                            self.control.file_name
                        )))
                    }
                    _ => {
                        self.state = WorkerState::Failed;
                        Step::End
                    }
                };
            }
        };

        match (msg.control_action(), self.state) {
            (Some(ControlAction::Start), WorkerState::NotStarted) => {
                self.state = WorkerState::Running;
                Step::Deliver(msg)
            }
            (_, WorkerState::NotStarted) => {
                warn!(message = %msg, "Message before start, dropped");
                Step::Skip
            }
            (Some(ControlAction::Start), WorkerState::Running) => {
                warn!("Duplicate start message, dropped");
                Step::Skip
            }
            (Some(ControlAction::Ended), WorkerState::Running) => {
                self.state = WorkerState::Completed;
                self.receiver.close();
                Step::Deliver(msg)
            }
            (Some(ControlAction::Error), WorkerState::Running) => {
                self.state = WorkerState::Failed;
                self.receiver.close();
                Step::Deliver(msg)
            }
            (None, WorkerState::Running) => Step::Deliver(msg),
            (_, WorkerState::Completed | WorkerState::Failed | WorkerState::Cancelled) => Step::End,
        }
    }
}

impl Iterator for WorkerStream {
    type Item = WorkerMessage;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_blocking()
    }
}

impl Drop for WorkerStream {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.control.cancel();
        }
    }
}

/// Text view of a worker stream
///
/// Yields each stdout/stderr line, ends on `ended`, and yields a single
/// `Err(NativeError::WorkerFailed)` carrying the diagnostic on `error`.
#[derive(Debug)]
pub struct ScriptOutput {
    stream: WorkerStream,
}

impl ScriptOutput {
    pub fn state(&self) -> WorkerState {
        self.stream.state()
    }

    pub fn cancel(&mut self) {
        self.stream.cancel();
    }
}

impl Iterator for ScriptOutput {
    type Item = Result<String, NativeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stream.next_blocking()? {
                WorkerMessage::Log(log) => return Some(Ok(log.message)),
                WorkerMessage::Control(control) => match control.action {
                    ControlAction::Start => continue,
                    ControlAction::Ended => return None,
                    ControlAction::Error => {
                        return Some(Err(NativeError::WorkerFailed {
                            message: control.message.unwrap_or_default(),
                        }))
                    }
                },
            }
        }
    }
}
