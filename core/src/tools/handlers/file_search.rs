use async_trait::async_trait;
use gantry_file_search::ListOptions;
use gantry_file_search::list_files;
use gantry_protocol::ToolKind;
use gantry_protocol::ToolResult;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::tools::context::Invocation;
use crate::tools::registry::ToolHandler;

pub struct FileSearchHandler;

#[async_trait]
impl ToolHandler for FileSearchHandler {
    fn name(&self) -> &'static str {
        "file_search"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::FileSearch
    }

    fn supports_parallel(&self) -> bool {
        true
    }

    fn is_mutating(&self) -> bool {
        false
    }

    fn describe(&self, invocation: &Invocation) -> ToolResult {
        let mut result = ToolResult::for_kind(ToolKind::FileSearch);
        result.path = invocation.workdir.display().to_string();
        result
    }

    async fn handle(
        &self,
        _cancel: &CancellationToken,
        invocation: &Invocation,
    ) -> Result<ToolResult> {
        let workdir = invocation.workdir.clone();
        // The walk is synchronous filesystem work; keep it off the runtime's
        // async workers.
        let results =
            tokio::task::spawn_blocking(move || list_files(&workdir, &ListOptions::default()))
                .await
                .map_err(|err| std::io::Error::other(err.to_string()))?;

        let mut lines: Vec<String> = results
            .entries
            .iter()
            .map(|entry| entry.path.display().to_string())
            .collect();
        if results.truncated {
            lines.push("[listing truncated]".to_string());
        }

        let mut result = ToolResult::for_kind(ToolKind::FileSearch);
        result.path = invocation.workdir.display().to_string();
        result.output = lines.join("\n");
        Ok(result)
    }
}
