use async_trait::async_trait;
use gantry_protocol::ToolKind;
use gantry_protocol::ToolResult;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::CoreErr;
use crate::error::Result;
use crate::tools::context::Invocation;
use crate::tools::handlers::parse_arguments;
use crate::tools::registry::ToolHandler;

pub struct FileReadHandler;

#[derive(Debug, Deserialize)]
struct FileReadArgs {
    #[serde(default)]
    path: String,
}

#[async_trait]
impl ToolHandler for FileReadHandler {
    fn name(&self) -> &'static str {
        "file_read"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::FileRead
    }

    fn supports_parallel(&self) -> bool {
        true
    }

    fn is_mutating(&self) -> bool {
        false
    }

    fn describe(&self, invocation: &Invocation) -> ToolResult {
        let mut result = ToolResult::for_kind(ToolKind::FileRead);
        if let Ok(args) = serde_json::from_str::<FileReadArgs>(&invocation.call.payload) {
            result.path = args.path;
        }
        result
    }

    async fn handle(
        &self,
        _cancel: &CancellationToken,
        invocation: &Invocation,
    ) -> Result<ToolResult> {
        let args: FileReadArgs = parse_arguments("file_read", &invocation.call.payload)?;
        if args.path.is_empty() {
            return Err(CoreErr::validation("missing path"));
        }
        let path = std::path::Path::new(&args.path);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            invocation.workdir.join(path)
        };

        let contents = tokio::fs::read_to_string(&resolved).await?;
        let mut result = ToolResult::for_kind(ToolKind::FileRead);
        result.path = resolved.display().to_string();
        result.output = contents;
        Ok(result)
    }
}
