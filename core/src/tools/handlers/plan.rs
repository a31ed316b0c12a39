//! `update_plan` gives the model a structured way to record its plan for
//! clients to render. The inputs are what matter; the output is a fixed
//! acknowledgement.

use async_trait::async_trait;
use gantry_protocol::ToolKind;
use gantry_protocol::ToolResult;
use gantry_protocol::plan_tool::UpdatePlanArgs;
use tokio_util::sync::CancellationToken;

use crate::error::CoreErr;
use crate::error::Result;
use crate::tools::context::Invocation;
use crate::tools::handlers::parse_arguments;
use crate::tools::registry::ToolHandler;

pub struct PlanHandler;

#[async_trait]
impl ToolHandler for PlanHandler {
    fn name(&self) -> &'static str {
        "update_plan"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::PlanUpdate
    }

    fn supports_parallel(&self) -> bool {
        true
    }

    fn is_mutating(&self) -> bool {
        false
    }

    fn describe(&self, _invocation: &Invocation) -> ToolResult {
        ToolResult::for_kind(ToolKind::PlanUpdate)
    }

    async fn handle(
        &self,
        _cancel: &CancellationToken,
        invocation: &Invocation,
    ) -> Result<ToolResult> {
        // Strict decode: unknown fields are rejected by the schema itself.
        let args: UpdatePlanArgs = parse_arguments("update_plan", &invocation.call.payload)?;
        for (index, item) in args.plan.iter().enumerate() {
            if item.step.trim().is_empty() {
                return Err(CoreErr::validation(format!(
                    "plan[{index}]: step is required"
                )));
            }
        }

        let mut result = ToolResult::for_kind(ToolKind::PlanUpdate);
        result.plan = args.plan;
        result.explanation = args.explanation.unwrap_or_default();
        result.output = "Plan updated".to_string();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolExecConfig;
    use crate::sandbox::SandboxRunner;
    use crate::unified_exec::UnifiedExecManager;
    use gantry_protocol::Policy;
    use gantry_protocol::ToolCall;
    use std::sync::Arc;

    fn invocation(payload: &str) -> Invocation {
        let config = ToolExecConfig::default();
        Invocation {
            call: ToolCall {
                id: "call-plan".to_string(),
                name: "update_plan".to_string(),
                payload: payload.to_string(),
            },
            workdir: std::env::temp_dir(),
            policy: Policy::default(),
            runner: Arc::new(SandboxRunner::new(
                config.sandbox_mode,
                config.writable_roots,
            )),
            unified_exec: UnifiedExecManager::new(),
        }
    }

    #[tokio::test]
    async fn valid_plan_is_acknowledged() {
        let cancel = CancellationToken::new();
        let inv = invocation(
            r#"{"explanation": "next", "plan": [{"step": "write tests", "status": "in_progress"}]}"#,
        );
        let result = PlanHandler.handle(&cancel, &inv).await.expect("ok");
        assert_eq!(result.output, "Plan updated");
        assert_eq!(result.plan.len(), 1);
        assert_eq!(result.explanation, "next");
    }

    #[tokio::test]
    async fn empty_step_is_rejected_with_index() {
        let cancel = CancellationToken::new();
        let inv = invocation(r#"{"plan": [{"step": "", "status": "pending"}]}"#);
        let err = PlanHandler.handle(&cancel, &inv).await.expect_err("error");
        assert!(err.to_string().contains("plan[0]: step is required"));
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let cancel = CancellationToken::new();
        let inv = invocation(r#"{"plan": [{"step": "x", "status": "pending"}], "foo": 1}"#);
        let err = PlanHandler.handle(&cancel, &inv).await.expect_err("error");
        assert!(err.to_string().contains("invalid update_plan payload"));
    }
}
