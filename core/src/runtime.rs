//! Runtime: registry lookup, per-handler locking, and the dispatcher loop
//! that turns bus requests into per-call tasks.
//!
//! Mutating tools take the write half of one RwLock and therefore run
//! mutually exclusively with every other tool; parallel-safe tools share
//! the read half and may overlap with each other.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use gantry_protocol::ApprovalDecision;
use gantry_protocol::Policy;
use gantry_protocol::ToolCall;
use gantry_protocol::ToolEventKind;
use gantry_protocol::ToolKind;
use gantry_protocol::ToolResult;
use gantry_protocol::ToolStatus;
use tokio::sync::RwLock;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::approvals::ApprovalStore;
use crate::config::ToolExecConfig;
use crate::review::CommandReviewer;
use crate::sandbox::SandboxRunner;
use crate::tools::EventSink;
use crate::tools::Invocation;
use crate::tools::Orchestrator;
use crate::tools::ToolRegistry;
use crate::tools::handlers::default_registry;
use crate::unified_exec::UnifiedExecManager;

const EVENT_BUS_CAPACITY: usize = 256;
const LOG_PAYLOAD_CAP: usize = 256;

/// Requests consumed by [`Runtime::serve`].
#[derive(Debug)]
pub enum RuntimeRequest {
    Dispatch {
        call: ToolCall,
        cancel: CancellationToken,
    },
    ApprovalDecision(ApprovalDecision),
}

pub struct Runtime {
    registry: ToolRegistry,
    orchestrator: Orchestrator,
    approvals: Arc<ApprovalStore>,
    unified_exec: Arc<UnifiedExecManager>,
    runner: Arc<SandboxRunner>,
    events: EventSink,
    policy: Policy,
    workdir: PathBuf,
    gate: RwLock<()>,
}

impl Runtime {
    pub fn new(config: ToolExecConfig) -> Arc<Self> {
        Self::with_reviewer(config, None)
    }

    pub fn with_reviewer(
        config: ToolExecConfig,
        reviewer: Option<Arc<dyn CommandReviewer>>,
    ) -> Arc<Self> {
        let events = EventSink::new(EVENT_BUS_CAPACITY);
        let approvals = ApprovalStore::new();
        let policy = config.policy();
        let workdir = config
            .workdir
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));
        let runner = Arc::new(SandboxRunner::new(
            config.sandbox_mode,
            config.writable_roots,
        ));
        let orchestrator =
            Orchestrator::new(Arc::clone(&approvals), events.clone(), reviewer);
        Arc::new(Self {
            registry: default_registry(),
            orchestrator,
            approvals,
            unified_exec: UnifiedExecManager::new(),
            runner,
            events,
            policy,
            workdir,
            gate: RwLock::new(()),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<gantry_protocol::ToolEvent> {
        self.events.subscribe()
    }

    pub fn resolve_approval(&self, approval_id: &str, approved: bool) {
        self.approvals.resolve(approval_id, approved);
    }

    /// Runs one tool call through the orchestrator under the appropriate
    /// lock, emitting every lifecycle event on the bus.
    pub async fn dispatch(&self, call: ToolCall, cancel: CancellationToken) -> ToolResult {
        let Some(handler) = self.registry.handler(&call.name) else {
            let mut result = ToolResult::for_kind(ToolKind::CommandExecution);
            result.id = call.id.clone();
            result.error = "unknown tool".to_string();
            result.status = Some(ToolStatus::Error);
            self.events.emit(ToolEventKind::ItemCompleted, &result, "");
            return result;
        };

        debug!(
            tool = %call.name,
            call_id = %call.id,
            payload = %sanitize_for_log(&call.payload),
            "dispatching tool call"
        );
        let started = Instant::now();

        let invocation = Invocation {
            call,
            workdir: self.workdir.clone(),
            policy: self.policy,
            runner: Arc::clone(&self.runner),
            unified_exec: Arc::clone(&self.unified_exec),
        };

        let result = if handler.supports_parallel() {
            let _guard = self.gate.read().await;
            self.orchestrator
                .run_call(&handler, &cancel, &invocation)
                .await
        } else {
            let _guard = self.gate.write().await;
            self.orchestrator
                .run_call(&handler, &cancel, &invocation)
                .await
        };

        debug!(
            call_id = %result.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = ?result.status,
            "tool call finished"
        );
        result
    }

    /// Dispatcher loop: one task per dispatch request so calls run
    /// independently; approval decisions resolve waiters immediately.
    pub async fn serve(self: Arc<Self>, mut requests: mpsc::UnboundedReceiver<RuntimeRequest>) {
        while let Some(request) = requests.recv().await {
            match request {
                RuntimeRequest::Dispatch { call, cancel } => {
                    let runtime = Arc::clone(&self);
                    tokio::spawn(async move {
                        runtime.dispatch(call, cancel).await;
                    });
                }
                RuntimeRequest::ApprovalDecision(decision) => {
                    self.approvals
                        .resolve(&decision.approval_id, decision.approved);
                }
            }
        }
    }
}

/// Payloads are model-controlled; strip control characters and cap length
/// before they reach a log line.
fn sanitize_for_log(payload: &str) -> String {
    let cleaned: String = payload
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    crate::truncate::truncate_with_notice(&cleaned, LOG_PAYLOAD_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitize_strips_control_characters() {
        let sanitized = sanitize_for_log("a\nb\x1b[31mc");
        assert!(!sanitized.contains('\n'));
        assert!(!sanitized.contains('\x1b'));
        assert!(sanitized.contains("a b"));
    }

    #[tokio::test]
    async fn unknown_tool_emits_single_completed_event() {
        let runtime = Runtime::new(ToolExecConfig::default());
        let mut rx = runtime.subscribe();
        let call = ToolCall {
            id: "call-x".to_string(),
            name: "no_such_tool".to_string(),
            payload: "{}".to_string(),
        };
        let result = runtime.dispatch(call, CancellationToken::new()).await;
        assert_eq!(result.error, "unknown tool");

        let event = rx.try_recv().expect("one event");
        assert_eq!(event.kind, ToolEventKind::ItemCompleted);
        assert_eq!(event.result.id, "call-x");
        assert!(rx.try_recv().is_err(), "no further events expected");
    }
}
