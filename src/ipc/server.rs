//! JSONL dispatch loop
//!
//! Reads requests, runs them against a `NativeService` and writes responses.
//! Plain functions run on their own thread so a blocking dialog never stalls
//! the loop; each script stream gets a pump thread that forwards messages as
//! `next` events. A stream id stays taken until its stream ends. On end of
//! input the loop cancels every open stream, then waits for in-flight calls
//! before returning.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, instrument, warn};

use super::io::{RequestReader, ResponseWriter};
use super::message::{NativeCall, RpcResponse};
use crate::error::{ErrorSeverity, NativeError};
use crate::native::NativeService;
use crate::worker::{CancelHandle, ControlAction, WorkerMessage, WorkerState, WorkerStream};

type Subscriptions = Arc<Mutex<HashMap<u64, CancelHandle>>>;

struct Server<S, W: Write> {
    service: Arc<S>,
    writer: ResponseWriter<W>,
    subscriptions: Subscriptions,
    in_flight: Vec<JoinHandle<()>>,
}

/// Serve requests from `input` until it ends
pub fn serve<S, R, W>(service: Arc<S>, input: R, output: W) -> io::Result<()>
where
    S: NativeService + 'static,
    R: Read,
    W: Write + Send + 'static,
{
    let mut server = Server {
        service,
        writer: ResponseWriter::new(output),
        subscriptions: Arc::new(Mutex::new(HashMap::new())),
        in_flight: Vec::new(),
    };
    let mut reader = RequestReader::new(input);

    info!("Native service listening");
    while let Some(parsed) = reader.next_request()? {
        match parsed {
            Ok(request) => match NativeCall::from_request(&request.method, request.params) {
                Ok(call) => server.dispatch(request.id, call)?,
                Err(e) => server.writer.send(&RpcResponse::error(request.id, e))?,
            },
            Err(failure) => server
                .writer
                .send(&RpcResponse::error(failure.id, failure.error))?,
        }
        server.in_flight.retain(|handle| !handle.is_finished());
    }

    let open_streams: Vec<(u64, CancelHandle)> = server.subscriptions.lock().drain().collect();
    for (id, handle) in open_streams {
        debug!(id, "Input closed, cancelling stream");
        handle.cancel();
    }

    debug!(pending = server.in_flight.len(), "Input closed, waiting for in-flight calls");
    for handle in server.in_flight.drain(..) {
        if handle.join().is_err() {
            warn!("RPC worker thread panicked");
        }
    }
    info!("Native service stopped");
    Ok(())
}

impl<S, W> Server<S, W>
where
    S: NativeService + 'static,
    W: Write + Send + 'static,
{
    #[instrument(skip(self, call), fields(method = call.method()))]
    fn dispatch(&mut self, id: u64, call: NativeCall) -> io::Result<()> {
        match call {
            NativeCall::ExecuteZxScript(request) => {
                // Unsubscribe addresses streams by request id, so a live one cannot be shadowed
                if self.subscriptions.lock().contains_key(&id) {
                    warn!(id, "Stream id already in use");
                    let message = format!("request {} already has an active stream", id);
                    return self.writer.send(&RpcResponse::error(id, message));
                }
                match self.service.execute_zx_script(request) {
                    Ok(stream) => self.subscribe(id, stream)?,
                    Err(e) => self.writer.send(&RpcResponse::error(id, e.to_string()))?,
                }
            }
            NativeCall::Unsubscribe(params) => {
                let cancelled = match self.subscriptions.lock().remove(&params.target) {
                    Some(handle) => {
                        handle.cancel();
                        true
                    }
                    None => false,
                };
                debug!(target = params.target, cancelled, "Unsubscribe");
                self.writer.send(&RpcResponse::result(id, json!(cancelled)))?;
            }
            NativeCall::Quit => {
                // Acknowledge first; quit does not return with a real host
                self.writer.send(&RpcResponse::result(id, Value::Null))?;
                self.service.quit();
            }
            call => {
                let service = self.service.clone();
                let writer = self.writer.clone();
                let handle = thread::Builder::new()
                    .name(format!("rpc-{}", id))
                    .spawn(move || {
                        let response = match run_call(service.as_ref(), call) {
                            Ok(value) => RpcResponse::result(id, value),
                            Err(e) => {
                                log_call_failure(id, &e);
                                RpcResponse::error(id, e.to_string())
                            }
                        };
                        if let Err(e) = writer.send(&response) {
                            error!(id, error = %e, "Failed to write response");
                        }
                    })?;
                self.in_flight.push(handle);
            }
        }
        Ok(())
    }

    fn subscribe(&mut self, id: u64, mut stream: WorkerStream) -> io::Result<()> {
        // Registered before the pump starts so an immediate unsubscribe finds it
        self.subscriptions.lock().insert(id, stream.cancel_handle());

        let writer = self.writer.clone();
        let subscriptions = self.subscriptions.clone();
        let handle = thread::Builder::new()
            .name(format!("rpc-stream-{}", id))
            .spawn(move || pump_stream(id, &mut stream, &writer, &subscriptions))?;
        self.in_flight.push(handle);
        Ok(())
    }
}

/// Run a plain function call and shape its result
fn run_call<S: NativeService + ?Sized>(
    service: &S,
    call: NativeCall,
) -> crate::error::Result<Value> {
    let value = match call {
        NativeCall::TryNut => {
            service.try_nut()?;
            Value::Null
        }
        NativeCall::Open(params) => {
            service.open(&params.uri, params.is_directory)?;
            Value::Null
        }
        NativeCall::OpenInEditor(params) => {
            service.open_in_editor(&params.file_path, params.editor_name.as_deref())?;
            Value::Null
        }
        NativeCall::OpenInGitGuiApp(params) => {
            service.open_in_git_gui_app(&params.file_path, params.editor_name.as_deref())?;
            Value::Null
        }
        NativeCall::PickDirectory(params) => {
            paths_value(service.pick_directory(params.default_path.as_deref())?)
        }
        NativeCall::PickFile(params) => paths_value(service.pick_file(&params.filters)?),
        NativeCall::ShowMessageBox(params) => {
            service.show_message_box(&params.message, params.kind, params.window_name)?;
            Value::Null
        }
        // Handled on the dispatch thread
        NativeCall::ExecuteZxScript(_) | NativeCall::Unsubscribe(_) | NativeCall::Quit => {
            Value::Null
        }
    };
    Ok(value)
}

fn log_call_failure(id: u64, e: &NativeError) {
    match e.severity() {
        ErrorSeverity::Warning => warn!(id, error = %e, "Native call rejected"),
        ErrorSeverity::Error => error!(id, error = %e, "Native call failed"),
        ErrorSeverity::Critical => {
            error!(id, error = %e, critical = true, "Native host cannot serve call")
        }
    }
}

fn paths_value(paths: Vec<PathBuf>) -> Value {
    Value::Array(
        paths
            .into_iter()
            .map(|p| Value::String(p.to_string_lossy().into_owned()))
            .collect(),
    )
}

/// Forward every worker message as `next`, then close with `complete` or `error`
///
/// A cancelled stream just stops; the caller asked for silence. The id is
/// released before the closing response goes out.
fn pump_stream<W: Write>(
    id: u64,
    stream: &mut WorkerStream,
    writer: &ResponseWriter<W>,
    subscriptions: &Subscriptions,
) {
    let mut failure: Option<String> = None;
    let own = stream.cancel_handle();

    while let Some(msg) = stream.next_blocking() {
        if let WorkerMessage::Control(control) = &msg {
            if control.action == ControlAction::Error {
                failure = Some(control.message.clone().unwrap_or_default());
            }
        }
        if let Err(e) = writer.send(&RpcResponse::next(id, msg)) {
            error!(id, error = %e, "Failed to write stream event, cancelling");
            stream.cancel();
            release_id(id, &own, subscriptions);
            return;
        }
    }
    release_id(id, &own, subscriptions);

    let closing = match stream.state() {
        WorkerState::Completed => RpcResponse::complete(id),
        WorkerState::Failed => RpcResponse::error(id, failure.unwrap_or_default()),
        WorkerState::Cancelled | WorkerState::NotStarted | WorkerState::Running => {
            debug!(id, state = ?stream.state(), "Stream ended without a terminal event");
            return;
        }
    };
    if let Err(e) = writer.send(&closing) {
        error!(id, error = %e, "Failed to write stream close");
    }
}

/// Drop the subscription for `id` unless a newer stream already took it over
fn release_id(id: u64, own: &CancelHandle, subscriptions: &Subscriptions) {
    let mut subscriptions = subscriptions.lock();
    if subscriptions
        .get(&id)
        .is_some_and(|handle| handle.same_execution(own))
    {
        subscriptions.remove(&id);
    }
}

/// Serve on this process's stdin/stdout
pub fn serve_stdio<S: NativeService + 'static>(service: Arc<S>) -> io::Result<()> {
    serve(service, io::stdin(), io::stdout())
}
