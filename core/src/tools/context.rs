use std::path::PathBuf;
use std::sync::Arc;

use gantry_protocol::Policy;
use gantry_protocol::SandboxMode;
use gantry_protocol::ToolCall;

use crate::sandbox::SandboxRunner;
use crate::unified_exec::UnifiedExecManager;

/// Per-call context handed to a tool handler. Lives for exactly one handler
/// invocation.
#[derive(Clone)]
pub struct Invocation {
    pub call: ToolCall,
    pub workdir: PathBuf,
    pub policy: Policy,
    pub runner: Arc<SandboxRunner>,
    pub unified_exec: Arc<UnifiedExecManager>,
}

impl Invocation {
    /// Clone of this invocation with isolation dropped, used for the
    /// approved retry-without-sandbox attempt.
    pub(crate) fn with_full_access(&self) -> Self {
        let mut invocation = self.clone();
        invocation.policy.sandbox_mode = SandboxMode::DangerFullAccess;
        invocation.runner = Arc::new(SandboxRunner::full_access());
        invocation
    }
}
