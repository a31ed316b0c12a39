mod apply_patch;
mod file_read;
mod file_search;
mod plan;
mod unified_exec;

use std::sync::Arc;

pub use apply_patch::ApplyPatchHandler;
pub use file_read::FileReadHandler;
pub use file_search::FileSearchHandler;
pub use plan::PlanHandler;
pub use unified_exec::UnifiedExecHandler;

use crate::error::CoreErr;
use crate::tools::registry::ToolRegistry;

pub(crate) fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool: &str,
    arguments: &str,
) -> Result<T, CoreErr> {
    serde_json::from_str(arguments).map_err(|err| CoreErr::invalid_payload(tool, err))
}

/// Registry with every built-in tool. `exec_command` and `write_stdin` share
/// one handler implementation registered under both names.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(UnifiedExecHandler::exec_command()));
    registry.register(Arc::new(UnifiedExecHandler::write_stdin()));
    registry.register(Arc::new(ApplyPatchHandler));
    registry.register(Arc::new(FileReadHandler));
    registry.register(Arc::new(FileSearchHandler));
    registry.register(Arc::new(PlanHandler));
    registry
}
