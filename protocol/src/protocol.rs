//! Core protocol types: policy knobs, per-call results, and the lifecycle
//! events emitted on the runtime's broadcast bus.

use crate::plan_tool::PlanItemArg;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Coarse sandbox policy knob. Determines what tool executions may touch on
/// the host before any approval flow is consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    /// No command execution or file mutation at all.
    #[default]
    ReadOnly,
    /// Writes restricted to the configured workspace roots.
    WorkspaceWrite,
    /// No isolation. The embedder has explicitly opted out.
    DangerFullAccess,
}

impl fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SandboxMode::ReadOnly => "read-only",
            SandboxMode::WorkspaceWrite => "workspace-write",
            SandboxMode::DangerFullAccess => "danger-full-access",
        };
        f.write_str(s)
    }
}

/// When human approval is required for a tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalPolicy {
    Never,
    #[default]
    OnRequest,
    OnFailure,
    Untrusted,
    AutoDeny,
}

impl fmt::Display for ApprovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalPolicy::Never => "never",
            ApprovalPolicy::OnRequest => "on-request",
            ApprovalPolicy::OnFailure => "on-failure",
            ApprovalPolicy::Untrusted => "untrusted",
            ApprovalPolicy::AutoDeny => "auto-deny",
        };
        f.write_str(s)
    }
}

/// The pair of knobs every tool call is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub sandbox_mode: SandboxMode,
    #[serde(default)]
    pub approval_policy: ApprovalPolicy,
}

/// Outcome of the policy gate for a single call.
///
/// Invariant: `allowed` implies `!requires_approval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
    pub requires_approval: bool,
}

impl Decision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            requires_approval: false,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            requires_approval: false,
        }
    }

    pub fn needs_approval(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            requires_approval: true,
        }
    }
}

/// Closed set of tool families the policy gate distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    CommandExecution,
    FileChange,
    FileRead,
    FileSearch,
    PlanUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Started,
    Updated,
    Completed,
    Error,
}

/// Result of one tool call, threaded through every lifecycle event.
///
/// `status == Some(Error)` iff `error` is non-empty once the orchestrator has
/// normalized the result. `session_id` is non-empty only for unified-exec
/// tools whose process has not exited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub kind: ToolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolStatus>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diff: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan: Vec<PlanItemArg>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approval_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approval_reason: String,
}

impl ToolResult {
    /// Empty result for a tool family; handlers fill in what they know.
    pub fn for_kind(kind: ToolKind) -> Self {
        Self {
            id: String::new(),
            kind,
            status: None,
            output: String::new(),
            diff: String::new(),
            error: String::new(),
            exit_code: None,
            session_id: String::new(),
            path: String::new(),
            command: String::new(),
            plan: Vec::new(),
            explanation: String::new(),
            approval_id: String::new(),
            approval_reason: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Lifecycle event kinds, totally ordered per call id. `ItemCompleted` is
/// terminal: no event with the same id may follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolEventKind {
    #[serde(rename = "approval.requested")]
    ApprovalRequested,
    #[serde(rename = "approval.completed")]
    ApprovalCompleted,
    #[serde(rename = "item.started")]
    ItemStarted,
    #[serde(rename = "item.updated")]
    ItemUpdated,
    #[serde(rename = "item.completed")]
    ItemCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    #[serde(rename = "type")]
    pub kind: ToolEventKind,
    pub result: ToolResult,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// Resolution of a pending approval, delivered to the runtime by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approval_id: String,
    pub approved: bool,
}
