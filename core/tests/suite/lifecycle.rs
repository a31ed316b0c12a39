//! Lifecycle and policy-gate behavior observable on the event bus.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gantry_core::Runtime;
use gantry_core::config::ToolExecConfig;
use gantry_core::review::CommandReviewer;
use gantry_core::review::ReviewAssessment;
use gantry_core::review::RiskLevel;
use gantry_protocol::ApprovalPolicy;
use gantry_protocol::SandboxMode;
use gantry_protocol::ToolEventKind;
use gantry_protocol::ToolStatus;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::suite::call;
use crate::suite::dispatch_and_collect;

fn runtime(sandbox_mode: SandboxMode, approval_policy: ApprovalPolicy) -> Arc<Runtime> {
    let mut config = ToolExecConfig::new(sandbox_mode, approval_policy);
    config.workdir = Some(std::env::temp_dir());
    Runtime::new(config)
}

#[tokio::test]
async fn read_only_sandbox_denies_command_with_single_event() {
    let runtime = runtime(SandboxMode::ReadOnly, ApprovalPolicy::Never);
    let (result, events) = dispatch_and_collect(
        &runtime,
        call("call-1", "exec_command", json!({"command": "echo hi"})),
    )
    .await;

    assert_eq!(result.status, Some(ToolStatus::Error));
    assert_eq!(result.error, "sandbox read-only: command blocked");
    let kinds: Vec<ToolEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ToolEventKind::ItemCompleted]);
}

#[tokio::test]
async fn auto_deny_policy_denies_without_approval() {
    let runtime = runtime(SandboxMode::WorkspaceWrite, ApprovalPolicy::AutoDeny);
    let (result, events) = dispatch_and_collect(
        &runtime,
        call("call-2", "exec_command", json!({"command": "true"})),
    )
    .await;

    assert_eq!(result.error, "auto-deny policy");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ToolEventKind::ItemCompleted);
}

#[tokio::test]
async fn denied_approval_completes_with_error() {
    let runtime = runtime(SandboxMode::WorkspaceWrite, ApprovalPolicy::OnRequest);
    runtime.resolve_approval("call-3", false);
    let (result, events) = dispatch_and_collect(
        &runtime,
        call("call-3", "exec_command", json!({"command": "true"})),
    )
    .await;

    let kinds: Vec<ToolEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ToolEventKind::ApprovalRequested,
            ToolEventKind::ApprovalCompleted,
            ToolEventKind::ItemCompleted,
        ]
    );
    assert!(events[1].reason.starts_with("denied:"));
    assert_eq!(result.status, Some(ToolStatus::Error));
    // No item.started may precede a denied approval.
    assert!(!kinds.contains(&ToolEventKind::ItemStarted));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn approved_call_starts_and_completes() {
    let runtime = runtime(SandboxMode::WorkspaceWrite, ApprovalPolicy::OnRequest);
    runtime.resolve_approval("call-4", true);
    let (result, events) = dispatch_and_collect(
        &runtime,
        call(
            "call-4",
            "exec_command",
            json!({"command": "echo approved-run", "yield_time_ms": 2000}),
        ),
    )
    .await;

    let kinds: Vec<ToolEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ToolEventKind::ApprovalRequested,
            ToolEventKind::ApprovalCompleted,
            ToolEventKind::ItemStarted,
            ToolEventKind::ItemCompleted,
        ]
    );
    assert_eq!(result.status, Some(ToolStatus::Completed));
    assert!(result.output.contains("approved-run"));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn on_failure_escalation_retries_without_sandbox() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = ToolExecConfig::new(SandboxMode::WorkspaceWrite, ApprovalPolicy::OnFailure);
    config.workdir = Some(dir.path().to_path_buf());
    let runtime = Runtime::new(config);
    runtime.resolve_approval("call-5", true);

    // Fails on the first attempt, succeeds on the retry.
    let script = "test -f marker || { touch marker; exit 7; }";
    let (result, events) = dispatch_and_collect(
        &runtime,
        call(
            "call-5",
            "exec_command",
            json!({"command": script, "yield_time_ms": 2000}),
        ),
    )
    .await;

    let kinds: Vec<ToolEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ToolEventKind::ItemStarted,
            ToolEventKind::ApprovalRequested,
            ToolEventKind::ApprovalCompleted,
            ToolEventKind::ItemUpdated,
            ToolEventKind::ItemCompleted,
        ]
    );
    assert!(events[1].reason.starts_with("retry without sandbox?"));
    assert_eq!(events[2].reason, "approved");
    assert_eq!(events[3].reason, "retrying without sandbox");
    assert_eq!(result.status, Some(ToolStatus::Completed));
    assert_eq!(result.exit_code, Some(0));
}

#[tokio::test]
async fn update_plan_rejects_empty_steps_with_index() {
    let runtime = runtime(SandboxMode::ReadOnly, ApprovalPolicy::OnRequest);
    let (result, events) = dispatch_and_collect(
        &runtime,
        call(
            "call-6",
            "update_plan",
            json!({"plan": [{"step": "", "status": "pending"}]}),
        ),
    )
    .await;

    assert_eq!(result.status, Some(ToolStatus::Error));
    assert!(result.error.contains("plan[0]: step is required"));
    // Plan updates bypass the gate even under read-only, so the call starts
    // before it fails validation.
    let kinds: Vec<ToolEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![ToolEventKind::ItemStarted, ToolEventKind::ItemCompleted]
    );
}

#[tokio::test]
async fn update_plan_rejects_unknown_fields() {
    let runtime = runtime(SandboxMode::WorkspaceWrite, ApprovalPolicy::Never);
    let (result, _) = dispatch_and_collect(
        &runtime,
        call(
            "call-7",
            "update_plan",
            json!({"plan": [{"step": "x", "status": "pending"}], "foo": 1}),
        ),
    )
    .await;
    assert_eq!(result.status, Some(ToolStatus::Error));
    assert!(result.error.contains("invalid update_plan payload"));
}

#[tokio::test]
async fn update_plan_succeeds_under_read_only() {
    let runtime = runtime(SandboxMode::ReadOnly, ApprovalPolicy::AutoDeny);
    let (result, _) = dispatch_and_collect(
        &runtime,
        call(
            "call-8",
            "update_plan",
            json!({"explanation": "plan", "plan": [{"step": "a", "status": "completed"}]}),
        ),
    )
    .await;
    assert_eq!(result.status, Some(ToolStatus::Completed));
    assert_eq!(result.output, "Plan updated");
}

struct StaticReviewer;

#[async_trait]
impl CommandReviewer for StaticReviewer {
    async fn review(&self, _workdir: &Path, command: &str) -> ReviewAssessment {
        ReviewAssessment {
            description: format!("runs `{command}`"),
            risk_level: RiskLevel::Low,
        }
    }
}

#[tokio::test]
async fn reviewer_enriches_the_approval_prompt() {
    let mut config = ToolExecConfig::new(SandboxMode::WorkspaceWrite, ApprovalPolicy::OnRequest);
    config.workdir = Some(std::env::temp_dir());
    let runtime = Runtime::with_reviewer(config, Some(Arc::new(StaticReviewer)));
    runtime.resolve_approval("call-9", false);
    let (_, events) = dispatch_and_collect(
        &runtime,
        call("call-9", "exec_command", json!({"command": "rm -rf /x"})),
    )
    .await;

    assert_eq!(events[0].kind, ToolEventKind::ApprovalRequested);
    assert!(events[0].reason.contains("runs `rm -rf /x`"));
}
