//! Interactive session behavior through the full runtime dispatch path.

#![cfg(unix)]

use std::sync::Arc;

use gantry_core::Runtime;
use gantry_core::config::ToolExecConfig;
use gantry_protocol::ApprovalPolicy;
use gantry_protocol::SandboxMode;
use gantry_protocol::ToolResult;
use gantry_protocol::ToolStatus;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::suite::call;
use crate::suite::dispatch_and_collect;

fn full_access_runtime() -> Arc<Runtime> {
    let mut config = ToolExecConfig::new(SandboxMode::DangerFullAccess, ApprovalPolicy::Never);
    config.workdir = Some(std::env::temp_dir());
    Runtime::new(config)
}

/// Keeps polling an open session with empty writes until the process exits.
async fn drain_session(
    runtime: &Arc<Runtime>,
    session_id: &str,
    mut output: String,
    id_prefix: &str,
) -> ToolResult {
    for attempt in 0..50 {
        let (result, _) = dispatch_and_collect(
            runtime,
            call(
                &format!("{id_prefix}-{attempt}"),
                "write_stdin",
                json!({"session_id": session_id, "chars": "", "yield_time_ms": 200}),
            ),
        )
        .await;
        output.push_str(&result.output);
        if result.session_id.is_empty() {
            let mut merged = result;
            merged.output = output;
            return merged;
        }
    }
    panic!("session never exited");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interactive_session_spans_multiple_calls() {
    let runtime = full_access_runtime();
    let (open, _) = dispatch_and_collect(
        &runtime,
        call(
            "exec-1",
            "exec_command",
            json!({
                "command": "printf 'Name: '; read -r n; echo \"NAME=$n\"",
                "yield_time_ms": 1000
            }),
        ),
    )
    .await;
    assert_eq!(open.status, Some(ToolStatus::Completed), "{}", open.error);
    assert!(!open.session_id.is_empty(), "expected a live session");
    assert!(open.output.contains("Name:"), "output: {}", open.output);
    assert_eq!(open.exit_code, None);

    let (written, _) = dispatch_and_collect(
        &runtime,
        call(
            "exec-2",
            "write_stdin",
            json!({
                "session_id": open.session_id,
                "chars": "bob\n",
                "yield_time_ms": 2000
            }),
        ),
    )
    .await;
    let finished = if written.session_id.is_empty() {
        written
    } else {
        drain_session(&runtime, &open.session_id, written.output, "exec-2-drain").await
    };
    assert!(finished.output.contains("NAME=bob"), "output: {}", finished.output);
    assert_eq!(finished.exit_code, Some(0));
    assert_eq!(finished.session_id, "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_stdin_to_unknown_session_errors() {
    let runtime = full_access_runtime();
    let (result, _) = dispatch_and_collect(
        &runtime,
        call(
            "exec-3",
            "write_stdin",
            json!({"session_id": "ghost", "chars": "x", "yield_time_ms": 100}),
        ),
    )
    .await;
    assert_eq!(result.status, Some(ToolStatus::Error));
    assert!(result.error.contains("unknown session id"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_session_id_is_a_validation_error() {
    let runtime = full_access_runtime();
    let (result, _) = dispatch_and_collect(
        &runtime,
        call("exec-4", "write_stdin", json!({"chars": "x"})),
    )
    .await;
    assert_eq!(result.status, Some(ToolStatus::Error));
    assert!(result.error.contains("missing session_id"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_command_is_a_validation_error() {
    let runtime = full_access_runtime();
    let (result, _) = dispatch_and_collect(
        &runtime,
        call("exec-5", "exec_command", json!({"command": "  "})),
    )
    .await;
    assert_eq!(result.status, Some(ToolStatus::Error));
    assert!(result.error.contains("empty command"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_command_surfaces_output_and_exit_code() {
    let runtime = full_access_runtime();
    let (result, _) = dispatch_and_collect(
        &runtime,
        call(
            "exec-6",
            "exec_command",
            json!({"command": "echo boom >&2; exit 9", "yield_time_ms": 2000}),
        ),
    )
    .await;
    assert_eq!(result.status, Some(ToolStatus::Error));
    assert_eq!(result.exit_code, Some(9));
    assert!(result.output.contains("boom"), "output: {}", result.output);
    assert!(result.error.contains("exited with code 9"));
}
