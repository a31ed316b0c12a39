use crate::unified_exec::UnifiedExecError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreErr>;

/// Sandbox refusals. Kept as a distinct type so the orchestrator can
/// recognize them and offer the retry-without-sandbox escalation.
#[derive(Debug, Error)]
pub enum SandboxErr {
    #[error("{reason}")]
    Denied { reason: String },
}

impl SandboxErr {
    pub fn denied(reason: impl Into<String>) -> Self {
        SandboxErr::Denied {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreErr {
    #[error(transparent)]
    Sandbox(#[from] SandboxErr),

    #[error(transparent)]
    UnifiedExec(#[from] UnifiedExecError),

    #[error("invalid {tool} payload: {message}")]
    InvalidPayload { tool: String, message: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Patch(#[from] gantry_apply_patch::ApplyPatchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreErr {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreErr::Validation(message.into())
    }

    pub fn invalid_payload(tool: &str, message: impl std::fmt::Display) -> Self {
        CoreErr::InvalidPayload {
            tool: tool.to_string(),
            message: message.to_string(),
        }
    }
}

/// True when `err` is a sandbox refusal, which makes the call eligible for
/// the on-failure escalation path.
pub fn is_sandbox_denied(err: &CoreErr) -> bool {
    matches!(err, CoreErr::Sandbox(SandboxErr::Denied { .. }))
}
