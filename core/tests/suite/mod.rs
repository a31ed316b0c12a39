mod exec;
mod lifecycle;
mod patch;

use std::sync::Arc;

use gantry_core::Runtime;
use gantry_protocol::ToolCall;
use gantry_protocol::ToolEvent;
use gantry_protocol::ToolResult;
use tokio_util::sync::CancellationToken;

/// Dispatches one call and returns the final result plus every event the
/// bus saw for it, in order.
pub(crate) async fn dispatch_and_collect(
    runtime: &Arc<Runtime>,
    call: ToolCall,
) -> (ToolResult, Vec<ToolEvent>) {
    let mut rx = runtime.subscribe();
    let result = runtime.dispatch(call, CancellationToken::new()).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (result, events)
}

pub(crate) fn call(id: &str, name: &str, payload: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        payload: payload.to_string(),
    }
}
