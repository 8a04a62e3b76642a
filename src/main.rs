//! native-service command line
//!
//! ```bash
//! # JSONL RPC over stdin/stdout
//! native-service serve
//!
//! # Run one script and stream its output
//! native-service run build.mjs -- --release
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use native_service::config::{self, NativeConfig};
use native_service::error::ResultExt;
use native_service::host::SystemHost;
use native_service::ipc;
use native_service::logging;
use native_service::process_manager::PROCESS_MANAGER;
use native_service::worker::{self, LogStream, ScriptRequest, WorkerMessage, WorkerState};
use native_service::DesktopNativeService;

/// Exit code when a run is cancelled before it finishes
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "native-service", version, about = "Native desktop operations and script workers")]
struct Cli {
    /// Config file to use instead of ~/.native-service/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve JSONL requests on stdin and write responses to stdout
    Serve,
    /// Run a script in a worker and print its output
    Run {
        file: PathBuf,
        /// Print every worker message as a JSON line
        #[arg(long)]
        json: bool,
        /// Arguments passed to the script
        #[arg(last = true)]
        args: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = logging::init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "native-service failed");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    match cli.command {
        Commands::Serve => serve(config),
        Commands::Run { file, json, args } => run_script(&config, file, json, args),
    }
}

fn serve(config: NativeConfig) -> Result<ExitCode> {
    if PROCESS_MANAGER.is_main_pid_stale() {
        warn!("Previous native-service did not shut down cleanly");
    }
    let orphans = PROCESS_MANAGER.cleanup_orphans();
    if orphans > 0 {
        info!(orphans, "Killed orphaned workers from a previous run");
    }
    PROCESS_MANAGER.write_main_pid().log_err();

    let service = Arc::new(DesktopNativeService::new(SystemHost::new(), config));
    let result = ipc::serve_stdio(service).context("RPC channel failed");

    PROCESS_MANAGER.kill_all_processes();
    PROCESS_MANAGER.remove_main_pid();
    result.map(|_| ExitCode::SUCCESS)
}

fn run_script(
    config: &NativeConfig,
    file: PathBuf,
    json: bool,
    args: Vec<String>,
) -> Result<ExitCode> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read script {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Not a script file: {}", file.display()))?;

    let request = ScriptRequest::new(file_name, content).with_args(args);
    let mut stream = worker::execute_script(request, config).context("Failed to start worker")?;

    while let Some(msg) = stream.next_blocking() {
        if json {
            println!("{}", serde_json::to_string(&msg)?);
            continue;
        }
        match msg {
            WorkerMessage::Log(log) => match log.stream {
                LogStream::Stdout => println!("{}", log.message),
                LogStream::Stderr => eprintln!("{}", log.message),
            },
            WorkerMessage::Control(control) => {
                if let Some(message) = control.message {
                    eprintln!("error: {}", message);
                }
            }
        }
    }

    Ok(match stream.state() {
        WorkerState::Completed => ExitCode::SUCCESS,
        WorkerState::Failed => ExitCode::FAILURE,
        _ => ExitCode::from(EXIT_CANCELLED),
    })
}
