//! Per-call pipeline: describe, policy gate, approval handshake, execution,
//! normalization, on-failure escalation, lifecycle events.
//!
//! The state machine per call is
//! `INIT -> (APPROVAL_PENDING ->)? STARTED -> (RETRY_APPROVAL_PENDING ->
//! RETRYING ->)? COMPLETED`, with `item.completed` terminal: no event for a
//! call id is ever emitted after it.

use std::sync::Arc;

use gantry_protocol::ApprovalPolicy;
use gantry_protocol::Decision;
use gantry_protocol::SandboxMode;
use gantry_protocol::ToolEventKind;
use gantry_protocol::ToolKind;
use gantry_protocol::ToolResult;
use gantry_protocol::ToolStatus;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::approvals::ApprovalStore;
use crate::approvals::WaitOutcome;
use crate::error::is_sandbox_denied;
use crate::policy;
use crate::review::CommandReviewer;
use crate::review::review_command;
use crate::tools::context::Invocation;
use crate::tools::events::EventSink;
use crate::tools::registry::ToolHandler;

pub struct Orchestrator {
    approvals: Arc<ApprovalStore>,
    events: EventSink,
    reviewer: Option<Arc<dyn CommandReviewer>>,
}

impl Orchestrator {
    pub fn new(
        approvals: Arc<ApprovalStore>,
        events: EventSink,
        reviewer: Option<Arc<dyn CommandReviewer>>,
    ) -> Self {
        Self {
            approvals,
            events,
            reviewer,
        }
    }

    /// Drives one tool call to its terminal `item.completed` event and
    /// returns the final result.
    pub async fn run_call(
        &self,
        handler: &Arc<dyn ToolHandler>,
        cancel: &CancellationToken,
        invocation: &Invocation,
    ) -> ToolResult {
        let mut base = handler.describe(invocation);
        base.id = invocation.call.id.clone();
        base.kind = handler.kind();

        let decision = match handler.kind() {
            // Plan updates are metadata, not execution.
            ToolKind::PlanUpdate => Decision::allow(""),
            ToolKind::FileChange => policy::allow_write(&invocation.policy),
            _ => policy::allow_command(&invocation.policy),
        };

        if !decision.allowed {
            if !decision.requires_approval {
                return self.complete_with_error(&base, &decision.reason);
            }
            let reason = self.approval_reason(&decision.reason, &base, invocation).await;
            let mut request = base.clone();
            request.approval_id = invocation.call.id.clone();
            request.approval_reason = reason.clone();
            self.events
                .emit(ToolEventKind::ApprovalRequested, &request, reason);
            match self.approvals.wait(&invocation.call.id, cancel).await {
                WaitOutcome::Approved => {
                    self.events
                        .emit(ToolEventKind::ApprovalCompleted, &request, "approved");
                }
                WaitOutcome::Denied => {
                    self.events.emit(
                        ToolEventKind::ApprovalCompleted,
                        &request,
                        format!("denied: {}", decision.reason),
                    );
                    return self.complete_with_error(&base, &decision.reason);
                }
                WaitOutcome::Canceled => {
                    self.events.emit(
                        ToolEventKind::ApprovalCompleted,
                        &request,
                        "denied: approval wait canceled",
                    );
                    return self.complete_with_error(&base, "approval wait canceled");
                }
            }
        }

        self.events.emit(ToolEventKind::ItemStarted, &base, "");

        let outcome = handler.handle(cancel, invocation).await;
        let (mut result, sandbox_denied) = normalize(&base, outcome);

        if self.should_escalate(&result, sandbox_denied, invocation) {
            result = self
                .escalate(handler, cancel, invocation, &base, result)
                .await;
        }

        self.events.emit(ToolEventKind::ItemCompleted, &result, "");
        result
    }

    /// On-failure escalation applies when the attempt errored, the policy is
    /// not `never`, the sandbox is not already wide open, and either the
    /// error was a sandbox refusal or the policy is `on-failure`.
    fn should_escalate(
        &self,
        result: &ToolResult,
        sandbox_denied: bool,
        invocation: &Invocation,
    ) -> bool {
        result.is_error()
            && invocation.policy.approval_policy != ApprovalPolicy::Never
            && invocation.policy.sandbox_mode != SandboxMode::DangerFullAccess
            && (sandbox_denied || invocation.policy.approval_policy == ApprovalPolicy::OnFailure)
    }

    async fn escalate(
        &self,
        handler: &Arc<dyn ToolHandler>,
        cancel: &CancellationToken,
        invocation: &Invocation,
        base: &ToolResult,
        failed: ToolResult,
    ) -> ToolResult {
        let reason = format!("retry without sandbox? {}", failed.error);
        let mut request = base.clone();
        request.approval_id = invocation.call.id.clone();
        request.approval_reason = reason.clone();
        self.events
            .emit(ToolEventKind::ApprovalRequested, &request, reason);

        match self.approvals.wait(&invocation.call.id, cancel).await {
            WaitOutcome::Approved => {
                self.events
                    .emit(ToolEventKind::ApprovalCompleted, &request, "approved");
            }
            WaitOutcome::Denied | WaitOutcome::Canceled => {
                self.events.emit(
                    ToolEventKind::ApprovalCompleted,
                    &request,
                    "denied: retry without sandbox rejected",
                );
                return failed;
            }
        }

        let mut updating = base.clone();
        updating.status = Some(ToolStatus::Updated);
        self.events.emit(
            ToolEventKind::ItemUpdated,
            &updating,
            "retrying without sandbox",
        );
        debug!("retrying call {} without sandbox", invocation.call.id);

        let retry_invocation = invocation.with_full_access();
        let outcome = handler.handle(cancel, &retry_invocation).await;
        let (result, _) = normalize(base, outcome);
        result
    }

    fn complete_with_error(&self, base: &ToolResult, error: &str) -> ToolResult {
        let mut result = base.clone();
        result.error = error.to_string();
        result.status = Some(ToolStatus::Error);
        self.events.emit(ToolEventKind::ItemCompleted, &result, "");
        result
    }

    /// Enriches the approval prompt with the external reviewer's assessment
    /// of the command, when one is configured.
    async fn approval_reason(
        &self,
        reason: &str,
        base: &ToolResult,
        invocation: &Invocation,
    ) -> String {
        let Some(reviewer) = &self.reviewer else {
            return reason.to_string();
        };
        if base.kind != ToolKind::CommandExecution || base.command.is_empty() {
            return reason.to_string();
        }
        match review_command(reviewer.as_ref(), &invocation.workdir, &base.command).await {
            Some(assessment) => format!(
                "{reason}: {} (risk: {:?})",
                assessment.description, assessment.risk_level
            ),
            None => reason.to_string(),
        }
    }
}

/// Forces the call id and kind onto the handler's result and derives the
/// error status: a handler error with an empty `error` field gets the error
/// string; an empty status becomes `error` or `completed` depending on
/// whether `error` is set.
fn normalize(
    base: &ToolResult,
    outcome: crate::error::Result<ToolResult>,
) -> (ToolResult, bool) {
    match outcome {
        Ok(mut result) => {
            result.id = base.id.clone();
            result.kind = base.kind;
            if result.status.is_none() {
                result.status = Some(if result.error.is_empty() {
                    ToolStatus::Completed
                } else {
                    ToolStatus::Error
                });
            }
            (result, false)
        }
        Err(err) => {
            let sandbox_denied = is_sandbox_denied(&err);
            let mut result = base.clone();
            result.error = err.to_string();
            result.status = Some(ToolStatus::Error);
            (result, sandbox_denied)
        }
    }
}
