//! `apply_patch`: file changes through the patch engine, with a minimal
//! unified diff of the actual before/after images for the approval UI.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use gantry_apply_patch::summarize_patch;
use gantry_apply_patch::unified_diff_between;
use gantry_protocol::ToolKind;
use gantry_protocol::ToolResult;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::CoreErr;
use crate::error::Result;
use crate::tools::context::Invocation;
use crate::tools::handlers::parse_arguments;
use crate::tools::registry::ToolHandler;
use crate::truncate::truncate_with_notice;

/// Cap on the raw-patch fallback placed in `ToolResult::diff` when no
/// before/after diff could be computed.
const RAW_PATCH_DIFF_CAP: usize = 12_000;

pub struct ApplyPatchHandler;

#[derive(Debug, Deserialize)]
struct ApplyPatchArgs {
    patch: String,
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl ToolHandler for ApplyPatchHandler {
    fn name(&self) -> &'static str {
        "apply_patch"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::FileChange
    }

    fn describe(&self, invocation: &Invocation) -> ToolResult {
        let mut result = ToolResult::for_kind(ToolKind::FileChange);
        if let Ok(args) = serde_json::from_str::<ApplyPatchArgs>(&invocation.call.payload) {
            result.path = summarize_patch(&args.patch).primary;
            // Preview diff for approval prompts; reads target files but
            // never touches the workspace.
            if gantry_apply_patch::is_custom_patch(&args.patch) {
                let cwd = match args.path.as_deref().filter(|p| !p.is_empty()) {
                    Some(path) => invocation.workdir.join(path),
                    None => invocation.workdir.clone(),
                };
                result.diff =
                    gantry_apply_patch::preview_patch_diff(&cwd, &args.patch).unwrap_or_default();
            }
        }
        result
    }

    async fn handle(
        &self,
        _cancel: &CancellationToken,
        invocation: &Invocation,
    ) -> Result<ToolResult> {
        let args: ApplyPatchArgs = parse_arguments("apply_patch", &invocation.call.payload)?;
        if args.patch.trim().is_empty() {
            return Err(CoreErr::validation("empty patch"));
        }
        let cwd = match args.path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => invocation.workdir.join(path),
            None => invocation.workdir.clone(),
        };

        let summary = summarize_patch(&args.patch);
        let before = capture_images(&cwd, &summary.paths);
        let output = invocation.runner.apply_patch(&cwd, &args.patch).await?;
        let after = capture_images(&cwd, &summary.paths);

        let mut diff = String::new();
        for path in &summary.paths {
            diff.push_str(&unified_diff_between(
                path,
                before.get(path).and_then(Option::as_deref),
                after.get(path).and_then(Option::as_deref),
            ));
        }
        if diff.is_empty() {
            diff = truncate_with_notice(&args.patch, RAW_PATCH_DIFF_CAP);
        }

        let mut result = ToolResult::for_kind(ToolKind::FileChange);
        result.output = output;
        result.diff = diff;
        result.path = summary.primary;
        Ok(result)
    }
}

/// Current contents of each referenced file; `None` when it does not exist.
fn capture_images(cwd: &Path, paths: &[String]) -> HashMap<String, Option<String>> {
    paths
        .iter()
        .map(|raw| {
            let path = PathBuf::from(raw);
            let resolved = if path.is_absolute() {
                path
            } else {
                cwd.join(path)
            };
            (raw.clone(), std::fs::read_to_string(resolved).ok())
        })
        .collect()
}
