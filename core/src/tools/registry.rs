use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gantry_protocol::ToolKind;
use gantry_protocol::ToolResult;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::Result;
use crate::tools::context::Invocation;

/// One tool implementation.
///
/// `describe` runs before policy evaluation so its result can be shown in
/// approval prompts; it must not have side effects. `handle` does the work
/// and returns a partially filled [`ToolResult`]; the orchestrator
/// normalizes ids, kinds, and error status afterwards.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ToolKind;

    /// Whether this tool may run concurrently with other parallel-safe
    /// tools. Mutating tools must return false.
    fn supports_parallel(&self) -> bool {
        false
    }

    /// Whether the tool might mutate the host. Stays true when in doubt.
    fn is_mutating(&self) -> bool {
        true
    }

    fn describe(&self, invocation: &Invocation) -> ToolResult;

    async fn handle(&self, cancel: &CancellationToken, invocation: &Invocation)
    -> Result<ToolResult>;
}

/// Name to handler map. Closed at construction; no reflection anywhere.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.name().to_string();
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!("overwriting handler for tool {name}");
        }
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).map(Arc::clone)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
