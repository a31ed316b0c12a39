//! Policy gate: given the sandbox mode and approval policy, decide whether a
//! tool call is allowed, denied, or needs human approval.
//!
//! `plan_update` never reaches this gate (it is metadata, not execution);
//! the orchestrator selects [`allow_write`] for `file_change` and
//! [`allow_command`] for everything else.

use gantry_protocol::ApprovalPolicy;
use gantry_protocol::Decision;
use gantry_protocol::Policy;
use gantry_protocol::SandboxMode;

pub const READ_ONLY_COMMAND_BLOCKED: &str = "sandbox read-only: command blocked";
pub const READ_ONLY_WRITE_BLOCKED: &str = "sandbox read-only: file changes blocked";

pub fn allow_command(policy: &Policy) -> Decision {
    gate(policy, READ_ONLY_COMMAND_BLOCKED)
}

pub fn allow_write(policy: &Policy) -> Decision {
    gate(policy, READ_ONLY_WRITE_BLOCKED)
}

fn gate(policy: &Policy, read_only_reason: &str) -> Decision {
    if policy.sandbox_mode == SandboxMode::ReadOnly {
        return Decision::deny(read_only_reason);
    }
    match policy.approval_policy {
        ApprovalPolicy::Untrusted | ApprovalPolicy::OnRequest => {
            Decision::needs_approval("approval required by policy")
        }
        ApprovalPolicy::AutoDeny => Decision::deny("auto-deny policy"),
        ApprovalPolicy::OnFailure => Decision::allow("allow until failure"),
        ApprovalPolicy::Never => Decision::allow(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy(sandbox_mode: SandboxMode, approval_policy: ApprovalPolicy) -> Policy {
        Policy {
            sandbox_mode,
            approval_policy,
        }
    }

    #[test]
    fn read_only_denies_regardless_of_approval_policy() {
        for approval in [
            ApprovalPolicy::Never,
            ApprovalPolicy::OnRequest,
            ApprovalPolicy::OnFailure,
            ApprovalPolicy::Untrusted,
            ApprovalPolicy::AutoDeny,
        ] {
            let decision = allow_command(&policy(SandboxMode::ReadOnly, approval));
            assert_eq!(decision, Decision::deny(READ_ONLY_COMMAND_BLOCKED));
            let decision = allow_write(&policy(SandboxMode::ReadOnly, approval));
            assert_eq!(decision, Decision::deny(READ_ONLY_WRITE_BLOCKED));
        }
    }

    #[test]
    fn untrusted_and_on_request_require_approval() {
        for approval in [ApprovalPolicy::Untrusted, ApprovalPolicy::OnRequest] {
            let decision = allow_command(&policy(SandboxMode::WorkspaceWrite, approval));
            assert!(!decision.allowed);
            assert!(decision.requires_approval);
        }
    }

    #[test]
    fn auto_deny_denies_without_approval() {
        let decision = allow_write(&policy(SandboxMode::DangerFullAccess, ApprovalPolicy::AutoDeny));
        assert_eq!(decision, Decision::deny("auto-deny policy"));
    }

    #[test]
    fn on_failure_allows_with_flag_reason() {
        let decision = allow_command(&policy(SandboxMode::WorkspaceWrite, ApprovalPolicy::OnFailure));
        assert_eq!(decision, Decision::allow("allow until failure"));
    }

    #[test]
    fn never_allows_silently() {
        let decision = allow_command(&policy(SandboxMode::WorkspaceWrite, ApprovalPolicy::Never));
        assert!(decision.allowed);
        assert!(decision.reason.is_empty());
    }
}
