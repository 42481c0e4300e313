//! Integration tests for the process bridge.
//! Runs real `sh` scripts from a temp dir as the external command. No mocks.
#![cfg(unix)]

use std::time::Duration;

use knecht_client::{BridgeError, ProcessBridge};

/// Write `body` as a shell script in `dir` and return a bridge running it with `sh`.
fn script_bridge(dir: &tempfile::TempDir, body: &str) -> ProcessBridge {
    let path = dir.path().join("caller.sh");
    std::fs::write(&path, body).unwrap();
    ProcessBridge::new("sh", path.to_str().unwrap())
}

#[tokio::test]
async fn output_lines_are_joined_with_trailing_newline() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "printf 'one\\ntwo\\nthree'\n");

    let result = bridge.invoke("question").await.expect("invoke should succeed");

    assert_eq!(result.output, "one\ntwo\nthree\n");
    assert_eq!(result.exit_code, Some(0));
}

#[tokio::test]
async fn question_is_passed_as_argument_and_on_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "echo \"arg:$1\"\nread -r line\necho \"stdin:$line\"\n");

    let result = bridge.invoke("Hello").await.expect("invoke should succeed");

    assert_eq!(result.output, "arg:Hello\nstdin:Hello\n");
}

#[tokio::test]
async fn empty_question_uses_default_input_for_argument_and_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "echo \"arg:$1\"\nread -r line\necho \"stdin:$line\"\n");

    let result = bridge.invoke("").await.expect("invoke should succeed");

    assert_eq!(result.output, "arg:Default input\nstdin:Default input\n");
}

#[tokio::test]
async fn configured_default_input_and_extra_args() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "echo \"$1|$2|$3\"\n")
        .with_args(["--backend", "ollama"])
        .with_default_input("fallback");

    let result = bridge.invoke("").await.expect("invoke should succeed");

    assert_eq!(result.output, "--backend|ollama|fallback\n");
}

#[tokio::test]
async fn stderr_is_merged_into_output() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "echo 'Traceback: no API key' >&2\n");

    let result = bridge.invoke("q").await.expect("invoke should succeed");

    assert_eq!(result.output, "Traceback: no API key\n");
}

#[tokio::test]
async fn crlf_terminators_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "printf 'a\\r\\nb\\r\\n'\n");

    let result = bridge.invoke("q").await.expect("invoke should succeed");

    assert_eq!(result.output, "a\nb\n");
}

#[tokio::test]
async fn no_output_yields_empty_string() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "exit 0\n");

    let result = bridge.invoke("q").await.expect("invoke should succeed");

    assert_eq!(result.output, "");
}

#[tokio::test]
async fn non_zero_exit_still_returns_output() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "echo 'Kein Argument übergeben.'\nexit 3\n");

    let result = bridge.invoke("q").await.expect("invoke should succeed");

    assert_eq!(result.output, "Kein Argument übergeben.\n");
    assert_eq!(result.exit_code, Some(3));
}

#[tokio::test]
async fn env_and_working_dir_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "echo \"$OPENAI_MODEL\"\nls\n")
        .with_envs([("OPENAI_MODEL", "gpt-4o-mini")])
        .with_working_dir(dir.path());

    let result = bridge.invoke("q").await.expect("invoke should succeed");

    assert_eq!(result.output, "gpt-4o-mini\ncaller.sh\n");
}

#[tokio::test]
async fn missing_interpreter_reports_spawn_error_with_empty_output() {
    let bridge = ProcessBridge::new("knecht-no-such-interpreter", "openaiCaller.py");

    let err = bridge.invoke("Hello").await.expect_err("spawn should fail");

    assert!(matches!(err, BridgeError::Spawn { .. }), "got: {err:?}");
    assert_eq!(err.partial_output(), "");
    assert!(err.to_string().contains("knecht-no-such-interpreter"));
}

#[tokio::test]
async fn timeout_kills_process_and_keeps_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "echo first\nexec sleep 10\n")
        .with_timeout(Duration::from_millis(500));

    let started = std::time::Instant::now();
    let err = bridge.invoke("q").await.expect_err("should time out");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(err, BridgeError::Timeout { .. }), "got: {err:?}");
    assert_eq!(err.into_partial_output(), "first\n");
}

#[tokio::test]
async fn script_ignoring_stdin_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "exec echo done\n");
    let long_input = "x".repeat(100 * 1024);

    let result = bridge.invoke(&long_input).await;

    // A large unread input may hit a closed pipe; that is tolerated.
    let result = result.expect("invoke should succeed");
    assert_eq!(result.output, "done\n");
}

#[tokio::test]
async fn stdout_and_stderr_keep_write_order() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(
        &dir,
        "i=0\nwhile [ $i -lt 200 ]; do\n  echo \"out$i\"\n  echo \"err$i\" >&2\n  i=$((i+1))\ndone\n",
    );

    let result = bridge.invoke("q").await.expect("invoke should succeed");

    let expected: String = (0..200).map(|i| format!("out{i}\nerr{i}\n")).collect();
    assert_eq!(result.output, expected);
}

#[tokio::test]
async fn lone_carriage_return_ends_a_line() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "printf 'a\\rb\\r\\nc\\r\\rd'\n");

    let result = bridge.invoke("q").await.expect("invoke should succeed");

    assert_eq!(result.output, "a\nb\nc\n\nd\n");
}

#[tokio::test]
async fn timeout_covers_input_the_process_never_reads() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = script_bridge(&dir, "exec sleep 30\n").with_timeout(Duration::from_millis(500));
    // Larger than a pipe buffer, small enough for a single command-line argument.
    let question = "y".repeat(120 * 1024);

    let outcome = tokio::time::timeout(Duration::from_secs(5), bridge.invoke(&question))
        .await
        .expect("bridge timeout should fire while stdin is still being written");

    match outcome {
        Err(BridgeError::Timeout { after, .. }) => assert_eq!(after, Duration::from_millis(500)),
        other => panic!("expected timeout, got {other:?}"),
    }
}
