//! apply_patch, file_read, and file_search flows through the runtime.

use std::sync::Arc;

use gantry_core::Runtime;
use gantry_core::config::ToolExecConfig;
use gantry_protocol::ApprovalPolicy;
use gantry_protocol::SandboxMode;
use gantry_protocol::ToolStatus;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use crate::suite::call;
use crate::suite::dispatch_and_collect;

fn workspace_runtime(dir: &TempDir) -> Arc<Runtime> {
    let mut config = ToolExecConfig::new(SandboxMode::WorkspaceWrite, ApprovalPolicy::Never);
    config.workdir = Some(dir.path().to_path_buf());
    Runtime::new(config)
}

#[tokio::test]
async fn patch_escaping_the_workspace_is_rejected_without_writes() {
    let dir = TempDir::new().expect("tempdir");
    let runtime = workspace_runtime(&dir);
    let diff = "--- /etc/passwd\n+++ /etc/passwd\n@@ -1 +1 @@\n-root\n+pwned\n";
    let (result, _) = dispatch_and_collect(
        &runtime,
        call("patch-1", "apply_patch", json!({"patch": diff})),
    )
    .await;

    assert_eq!(result.status, Some(ToolStatus::Error));
    assert!(result.error.contains("outside workspace"));
    // Nothing may have been written into the workspace either.
    assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
}

#[tokio::test]
async fn custom_patch_applies_and_reports_a_diff() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").expect("seed");
    let runtime = workspace_runtime(&dir);

    let patch = "*** Begin Patch\n\
                 *** Update File: main.rs\n\
                 @@\n\
                 -fn main() {}\n\
                 +fn main() { println!(\"hi\"); }\n\
                 *** End Patch";
    let (result, _) = dispatch_and_collect(
        &runtime,
        call("patch-2", "apply_patch", json!({"patch": patch})),
    )
    .await;

    assert_eq!(result.status, Some(ToolStatus::Completed), "{}", result.error);
    assert_eq!(result.path, "main.rs");
    assert!(result.output.contains("main.rs"));
    assert!(result.diff.contains("+fn main() { println!(\"hi\"); }"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("main.rs")).expect("read"),
        "fn main() { println!(\"hi\"); }\n"
    );
}

#[tokio::test]
async fn patch_add_reports_new_file_diff() {
    let dir = TempDir::new().expect("tempdir");
    let runtime = workspace_runtime(&dir);
    let patch = "*** Begin Patch\n*** Add File: notes.md\n+hello\n*** End Patch";
    let (result, _) = dispatch_and_collect(
        &runtime,
        call("patch-3", "apply_patch", json!({"patch": patch})),
    )
    .await;

    assert_eq!(result.status, Some(ToolStatus::Completed), "{}", result.error);
    assert!(result.diff.contains("--- /dev/null"));
    assert!(result.diff.contains("+hello"));
}

#[tokio::test]
async fn read_only_sandbox_blocks_patches() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = ToolExecConfig::new(SandboxMode::ReadOnly, ApprovalPolicy::Never);
    config.workdir = Some(dir.path().to_path_buf());
    let runtime = Runtime::new(config);

    let patch = "*** Begin Patch\n*** Add File: a.txt\n+x\n*** End Patch";
    let (result, _) = dispatch_and_collect(
        &runtime,
        call("patch-4", "apply_patch", json!({"patch": patch})),
    )
    .await;
    assert_eq!(result.status, Some(ToolStatus::Error));
    assert_eq!(result.error, "sandbox read-only: file changes blocked");
    assert!(!dir.path().join("a.txt").exists());
}

#[tokio::test]
async fn file_read_returns_contents() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("config.toml"), "key = 1\n").expect("seed");
    let mut config = ToolExecConfig::new(SandboxMode::WorkspaceWrite, ApprovalPolicy::Never);
    config.workdir = Some(dir.path().to_path_buf());
    let runtime = Runtime::new(config);

    let (result, _) = dispatch_and_collect(
        &runtime,
        call("read-1", "file_read", json!({"path": "config.toml"})),
    )
    .await;
    assert_eq!(result.status, Some(ToolStatus::Completed), "{}", result.error);
    assert_eq!(result.output, "key = 1\n");
}

#[tokio::test]
async fn file_search_lists_workspace_files() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("lib.rs"), "").expect("seed");
    std::fs::create_dir_all(dir.path().join("node_modules")).expect("seed");
    std::fs::write(dir.path().join("node_modules/skip.js"), "").expect("seed");
    let mut config = ToolExecConfig::new(SandboxMode::WorkspaceWrite, ApprovalPolicy::Never);
    config.workdir = Some(dir.path().to_path_buf());
    let runtime = Runtime::new(config);

    let (result, _) =
        dispatch_and_collect(&runtime, call("search-1", "file_search", json!({}))).await;
    assert_eq!(result.status, Some(ToolStatus::Completed), "{}", result.error);
    assert!(result.output.contains("lib.rs"));
    assert!(!result.output.contains("skip.js"));
}
