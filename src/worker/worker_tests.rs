use super::*;
use crate::config::NativeConfig;
use crate::error::NativeError;
use crate::process_manager::test_process_manager;
use futures::executor::block_on;
use std::time::{Duration, Instant};

fn start(request: ScriptRequest, config: &NativeConfig) -> WorkerStream {
    let options =
        WorkerOptions::from_config(&request, config).with_process_manager(test_process_manager());
    execute_script_with(request, options).unwrap()
}

fn run(file_name: &str, content: &str) -> Vec<WorkerMessage> {
    start(ScriptRequest::new(file_name, content), &NativeConfig::default()).collect()
}

fn lines_of(messages: &[WorkerMessage], stream: LogStream) -> Vec<String> {
    messages
        .iter()
        .filter_map(|msg| match msg {
            WorkerMessage::Log(log) if log.stream == stream => Some(log.message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_successful_script_emits_start_logs_ended() {
    let messages = run("hello.sh", "echo a\necho b >&2\n");

    assert_eq!(messages.first(), Some(&WorkerMessage::start()));
    assert_eq!(messages.last(), Some(&WorkerMessage::ended()));
    assert_eq!(messages.len(), 4);
    assert_eq!(lines_of(&messages, LogStream::Stdout), vec!["a"]);
    assert_eq!(lines_of(&messages, LogStream::Stderr), vec!["b"]);
}

#[test]
fn test_failing_script_emits_error_with_stderr() {
    let messages = run("fail.sh", "echo boom >&2\nexit 3\n");

    assert_eq!(messages.first(), Some(&WorkerMessage::start()));
    assert_eq!(lines_of(&messages, LogStream::Stderr), vec!["boom"]);

    match messages.last() {
        Some(WorkerMessage::Control(ControlMessage {
            action: ControlAction::Error,
            message: Some(message),
        })) => {
            assert!(message.contains("fail.sh"), "got: {}", message);
            assert!(message.contains("exited with code 3"), "got: {}", message);
            assert!(message.contains("boom"), "got: {}", message);
        }
        other => panic!("expected error control message, got {:?}", other),
    }
}

#[test]
fn test_exactly_one_terminal_message() {
    let messages = run("quiet.sh", "true\n");
    assert_eq!(messages, vec![WorkerMessage::start(), WorkerMessage::ended()]);
    assert_eq!(messages.iter().filter(|m| m.is_terminal()).count(), 1);
}

#[test]
fn test_per_stream_order_is_preserved() {
    let script = "i=1\nwhile [ $i -le 200 ]; do echo out$i; echo err$i >&2; i=$((i+1)); done\n";
    let messages = run("order.sh", script);

    let expected_out: Vec<String> = (1..=200).map(|i| format!("out{}", i)).collect();
    let expected_err: Vec<String> = (1..=200).map(|i| format!("err{}", i)).collect();
    assert_eq!(lines_of(&messages, LogStream::Stdout), expected_out);
    assert_eq!(lines_of(&messages, LogStream::Stderr), expected_err);
    assert_eq!(messages.last(), Some(&WorkerMessage::ended()));
}

#[test]
fn test_cancel_after_start_delivers_nothing_more() {
    let mut stream = start(
        ScriptRequest::new("slow.sh", "echo tick\nsleep 5\necho never\n"),
        &NativeConfig::default(),
    );

    assert_eq!(stream.next(), Some(WorkerMessage::start()));
    let started = Instant::now();
    stream.cancel();

    assert_eq!(stream.next(), None);
    assert_eq!(stream.state(), WorkerState::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_cancel_kills_the_process() {
    let mut stream = start(
        ScriptRequest::new("pid.sh", "echo $$\nsleep 30\n"),
        &NativeConfig::default(),
    );

    assert_eq!(stream.next(), Some(WorkerMessage::start()));
    let pid: u32 = match stream.next() {
        Some(WorkerMessage::Log(log)) => log.message.trim().parse().unwrap(),
        other => panic!("expected pid line, got {:?}", other),
    };
    stream.cancel();

    let deadline = Instant::now() + Duration::from_secs(3);
    while process_group_alive(pid) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(25));
    }
    assert!(!process_group_alive(pid));
}

#[test]
fn test_cancel_handle_stops_blocked_subscriber() {
    let mut stream = start(ScriptRequest::new("block.sh", "sleep 5\n"), &NativeConfig::default());
    assert_eq!(stream.next(), Some(WorkerMessage::start()));

    let handle = stream.cancel_handle();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        handle.cancel();
    });

    let started = Instant::now();
    assert_eq!(stream.next(), None);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_invocations_are_independent() {
    let config = NativeConfig::default();
    let first = start(ScriptRequest::new("one.sh", "echo one\n"), &config);
    let second = start(ScriptRequest::new("two.sh", "echo two\n"), &config);

    let second: Vec<_> = second.collect();
    let first: Vec<_> = first.collect();

    assert_eq!(lines_of(&first, LogStream::Stdout), vec!["one"]);
    assert_eq!(lines_of(&second, LogStream::Stdout), vec!["two"]);
    assert_eq!(first.last(), Some(&WorkerMessage::ended()));
    assert_eq!(second.last(), Some(&WorkerMessage::ended()));
}

#[test]
fn test_spawn_failure_is_reported_after_start() {
    let mut config = NativeConfig::default();
    config.runtimes.insert(
        "mjs".to_string(),
        "/nonexistent/runtime-for-native-service".to_string(),
    );

    let messages: Vec<_> = start(ScriptRequest::new("x.mjs", "1"), &config).collect();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], WorkerMessage::start());
    match &messages[1] {
        WorkerMessage::Control(ControlMessage {
            action: ControlAction::Error,
            message: Some(message),
        }) => assert!(message.contains("Failed to spawn"), "got: {}", message),
        other => panic!("expected spawn error, got {:?}", other),
    }
}

#[test]
fn test_args_env_and_cwd_are_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let request = ScriptRequest::new("ctx.sh", "echo \"$1 $2\"\necho \"$GREETING\"\npwd\n")
        .with_args(["first", "second"])
        .with_env("GREETING", "hello")
        .with_cwd(dir.path());

    let messages: Vec<_> = start(request, &NativeConfig::default()).collect();
    let stdout = lines_of(&messages, LogStream::Stdout);

    assert_eq!(stdout[0], "first second");
    assert_eq!(stdout[1], "hello");
    let reported = std::fs::canonicalize(&stdout[2]).unwrap();
    assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
}

#[test]
fn test_crlf_and_unterminated_lines() {
    let messages = run("crlf.sh", "printf 'a\\r\\nb'\n");
    assert_eq!(lines_of(&messages, LogStream::Stdout), vec!["a", "b"]);
}

#[test]
fn test_output_projection_of_real_worker() {
    let output = start(
        ScriptRequest::new("proj.sh", "echo one\necho two >&2\nexit 1\n"),
        &NativeConfig::default(),
    )
    .into_output();

    let items: Vec<_> = output.collect();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap(), "one");
    assert_eq!(items[1].as_ref().unwrap(), "two");
    assert!(matches!(
        &items[2],
        Err(NativeError::WorkerFailed { message }) if message.contains("two")
    ));
}

#[test]
fn test_temp_script_is_removed_after_completion() {
    let messages = run("where.sh", "echo \"$0\"\n");
    let script_path = std::path::PathBuf::from(&lines_of(&messages, LogStream::Stdout)[0]);
    assert!(script_path.ends_with("where.sh"));

    // The supervisor drops the temp dir right after sending the terminal message
    let deadline = Instant::now() + Duration::from_secs(2);
    while script_path.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!script_path.exists());
}

#[test]
fn test_background_job_does_not_hold_back_ended() {
    let started = Instant::now();
    let messages = run("bg.sh", "sleep 4 &\necho done\nexit 0\n");

    assert_eq!(
        messages,
        vec![
            WorkerMessage::start(),
            WorkerMessage::stdout("done"),
            WorkerMessage::ended(),
        ]
    );
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "ended waited for the background job: {:?}",
        started.elapsed()
    );
}

#[test]
fn test_async_subscriber_receives_whole_stream() {
    let mut stream = start(
        ScriptRequest::new("async.sh", "echo a\necho b >&2\n"),
        &NativeConfig::default(),
    );

    let messages = block_on(async {
        let mut messages = Vec::new();
        while let Some(msg) = stream.next_message().await {
            messages.push(msg);
        }
        messages
    });

    assert_eq!(messages.first(), Some(&WorkerMessage::start()));
    assert_eq!(messages.last(), Some(&WorkerMessage::ended()));
    assert_eq!(lines_of(&messages, LogStream::Stdout), vec!["a"]);
    assert_eq!(lines_of(&messages, LogStream::Stderr), vec!["b"]);
    assert_eq!(stream.state(), WorkerState::Completed);
}

#[test]
fn test_async_subscriber_cancel_mid_stream() {
    let mut stream = start(
        ScriptRequest::new("async-slow.sh", "echo tick\nsleep 5\necho never\n"),
        &NativeConfig::default(),
    );
    let started = Instant::now();

    let (first, second, after_cancel) = block_on(async {
        let first = stream.next_message().await;
        let second = stream.next_message().await;
        stream.cancel();
        let after_cancel = stream.next_message().await;
        (first, second, after_cancel)
    });

    assert_eq!(first, Some(WorkerMessage::start()));
    assert_eq!(second, Some(WorkerMessage::stdout("tick")));
    assert_eq!(after_cancel, None);
    assert_eq!(stream.state(), WorkerState::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_cancel_handle_wakes_pending_async_receive() {
    let mut stream = start(
        ScriptRequest::new("async-block.sh", "sleep 5\n"),
        &NativeConfig::default(),
    );
    let handle = stream.cancel_handle();

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        handle.cancel();
    });

    let started = Instant::now();
    let messages = block_on(async {
        let mut messages = Vec::new();
        while let Some(msg) = stream.next_message().await {
            messages.push(msg);
        }
        messages
    });
    canceller.join().unwrap();

    assert!(messages.len() <= 1, "got: {:?}", messages);
    assert_eq!(stream.state(), WorkerState::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(3));
}
