//! Patch engine for the tool-execution core.
//!
//! Two input formats are supported:
//!
//! - The custom `*** Begin Patch` format (see [`parser`]), applied in
//!   process with a monotonic per-file cursor.
//! - Standard unified diffs, delegated to the host `patch -p0 --force`
//!   under a one-minute deadline.
//!
//! The engine also produces side-effect-free preview diffs for approval UIs
//! and per-file unified diffs from before/after images.

mod parser;
mod seek_sequence;

use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

pub use parser::ParseError;
pub use parser::PatchOp;
pub use parser::UpdateEdit;
pub use parser::UpdateHunk;
pub use parser::parse_patch;
use similar::TextDiff;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const PATCH_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ApplyPatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("patch context not found: {0}")]
    ContextNotFound(String),
    #[error("patch command failed: {0}")]
    PatchCommand(String),
}

impl ApplyPatchError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ApplyPatchError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Files touched while applying a patch, in application order.
#[derive(Debug, Default)]
pub struct AffectedPaths {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

/// Ordered unique set of paths a patch references. `primary` is the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSummary {
    pub paths: Vec<String>,
    pub primary: String,
}

/// True when `text` uses the custom patch format rather than a unified diff.
pub fn is_custom_patch(text: &str) -> bool {
    text.contains("*** Begin Patch")
}

/// Applies `patch` (either format) relative to `workdir` and returns a
/// human-readable summary of the files changed.
pub async fn apply_patch_text(workdir: &Path, patch: &str) -> Result<String, ApplyPatchError> {
    if is_custom_patch(patch) {
        let ops = parse_patch(patch)?;
        let affected = apply_ops(workdir, &ops)?;
        Ok(render_summary(&affected))
    } else {
        apply_unified_diff(workdir, patch).await
    }
}

/// Applies parsed operations to the filesystem. Relative paths resolve
/// against `workdir`.
pub fn apply_ops(workdir: &Path, ops: &[PatchOp]) -> Result<AffectedPaths, ApplyPatchError> {
    let mut affected = AffectedPaths::default();
    for op in ops {
        match op {
            PatchOp::Add { path, contents } => {
                let path = resolve(workdir, path);
                write_file(&path, contents)?;
                affected.added.push(path);
            }
            PatchOp::Delete { path } => {
                let path = resolve(workdir, path);
                std::fs::remove_file(&path).map_err(|err| {
                    ApplyPatchError::io(format!("failed to delete file {}", path.display()), err)
                })?;
                affected.deleted.push(path);
            }
            PatchOp::Update {
                path,
                move_path,
                edit,
            } => {
                let path = resolve(workdir, path);
                let original = read_file(&path)?;
                let new_contents = derive_new_contents(&path, &original, edit)?;
                if let Some(dest) = move_path {
                    let dest = resolve(workdir, dest);
                    write_file(&dest, &new_contents)?;
                    std::fs::remove_file(&path).map_err(|err| {
                        ApplyPatchError::io(
                            format!("failed to remove original {}", path.display()),
                            err,
                        )
                    })?;
                    affected.modified.push(dest);
                } else {
                    write_file(&path, &new_contents)?;
                    affected.modified.push(path);
                }
            }
        }
    }
    Ok(affected)
}

/// Summary of changed files in git status style.
pub fn render_summary(affected: &AffectedPaths) -> String {
    let mut out = String::from("Success. Updated the following files:\n");
    for path in &affected.added {
        out.push_str(&format!("A {}\n", path.display()));
    }
    for path in &affected.modified {
        out.push_str(&format!("M {}\n", path.display()));
    }
    for path in &affected.deleted {
        out.push_str(&format!("D {}\n", path.display()));
    }
    out
}

/// All paths referenced by a patch in either format, in order, deduplicated.
/// Used by the sandbox runner for containment checks before anything touches
/// the filesystem.
pub fn referenced_paths(patch: &str) -> Vec<String> {
    const FILE_MARKERS: [&str; 4] = [
        "*** Add File: ",
        "*** Delete File: ",
        "*** Update File: ",
        "*** Move to: ",
    ];
    let mut paths: Vec<String> = Vec::new();
    let mut push = |raw: &str| {
        let cleaned = raw
            .strip_prefix("a/")
            .or_else(|| raw.strip_prefix("b/"))
            .unwrap_or(raw);
        if cleaned.is_empty() || cleaned == "/dev/null" {
            return;
        }
        if !paths.iter().any(|existing| existing == cleaned) {
            paths.push(cleaned.to_string());
        }
    };
    for line in patch.lines() {
        let trimmed = line.trim();
        if let Some(rest) = FILE_MARKERS
            .iter()
            .find_map(|marker| trimmed.strip_prefix(marker))
        {
            push(rest.trim());
            continue;
        }
        if let Some(rest) = trimmed
            .strip_prefix("--- ")
            .or_else(|| trimmed.strip_prefix("+++ "))
            && let Some(token) = rest.split_whitespace().next()
        {
            push(token);
        }
    }
    paths
}

/// Ordered unique paths plus the primary (first) one.
pub fn summarize_patch(patch: &str) -> PatchSummary {
    let paths = referenced_paths(patch);
    let primary = paths.first().cloned().unwrap_or_default();
    PatchSummary { paths, primary }
}

/// Computes the unified diff the patch would produce without touching the
/// real workspace: target files are read for their current contents, the
/// patch is applied in memory, and each file is diffed individually.
pub fn preview_patch_diff(workdir: &Path, patch: &str) -> Result<String, ApplyPatchError> {
    let ops = parse_patch(patch)?;
    let mut out = String::new();
    for op in &ops {
        let rendered = match op {
            PatchOp::Add { path, contents } => {
                unified_diff_between(&display(path), None, Some(contents))
            }
            PatchOp::Delete { path } => {
                let resolved = resolve(workdir, path);
                let before = read_file(&resolved)?;
                unified_diff_between(&display(path), Some(&before), None)
            }
            PatchOp::Update {
                path,
                move_path,
                edit,
            } => {
                let resolved = resolve(workdir, path);
                let before = read_file(&resolved)?;
                let after = derive_new_contents(&resolved, &before, edit)?;
                let shown = move_path.as_ref().unwrap_or(path);
                unified_diff_between(&display(shown), Some(&before), Some(&after))
            }
        };
        out.push_str(&rendered);
    }
    Ok(out)
}

/// Minimal unified diff between two file images, with `--- / +++` headers.
/// `None` means the file does not exist on that side.
pub fn unified_diff_between(rel: &str, before: Option<&str>, after: Option<&str>) -> String {
    let old = before.unwrap_or("");
    let new = after.unwrap_or("");
    if old == new {
        return String::new();
    }
    let body = TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(1)
        .to_string();
    let header_old = match before {
        Some(_) => format!("a/{rel}"),
        None => "/dev/null".to_string(),
    };
    let header_new = match after {
        Some(_) => format!("b/{rel}"),
        None => "/dev/null".to_string(),
    };
    format!("--- {header_old}\n+++ {header_new}\n{body}")
}

/// Applies a standard unified diff by delegating to the host `patch`
/// binary. Runs under [`PATCH_COMMAND_TIMEOUT`].
pub async fn apply_unified_diff(workdir: &Path, diff: &str) -> Result<String, ApplyPatchError> {
    let mut child = tokio::process::Command::new("patch")
        .args(["-p0", "--force"])
        .current_dir(workdir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| ApplyPatchError::io("failed to spawn patch(1)", err))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(diff.as_bytes())
            .await
            .map_err(|err| ApplyPatchError::io("failed to write diff to patch(1)", err))?;
    }

    let output = match tokio::time::timeout(PATCH_COMMAND_TIMEOUT, child.wait_with_output()).await {
        Ok(result) => {
            result.map_err(|err| ApplyPatchError::io("failed to wait for patch(1)", err))?
        }
        Err(_) => {
            return Err(ApplyPatchError::PatchCommand(
                "patch(1) timed out".to_string(),
            ));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        debug!("patch(1) failed: {stderr}");
        let detail = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr
        };
        return Err(ApplyPatchError::PatchCommand(detail.trim().to_string()));
    }
    Ok(stdout)
}

fn resolve(workdir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workdir.join(path)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn read_file(path: &Path) -> Result<String, ApplyPatchError> {
    std::fs::read_to_string(path)
        .map_err(|err| ApplyPatchError::io(format!("failed to read file {}", path.display()), err))
}

fn write_file(path: &Path, contents: &str) -> Result<(), ApplyPatchError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| {
            ApplyPatchError::io(
                format!("failed to create parent directories for {}", path.display()),
                err,
            )
        })?;
    }
    std::fs::write(path, contents)
        .map_err(|err| ApplyPatchError::io(format!("failed to write file {}", path.display()), err))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o644);
        std::fs::set_permissions(path, perms).map_err(|err| {
            ApplyPatchError::io(
                format!("failed to set permissions on {}", path.display()),
                err,
            )
        })?;
    }
    Ok(())
}

fn derive_new_contents(
    path: &Path,
    original: &str,
    edit: &UpdateEdit,
) -> Result<String, ApplyPatchError> {
    let hunks = match edit {
        UpdateEdit::Replace(contents) => return Ok(contents.clone()),
        UpdateEdit::Hunks(hunks) => hunks,
    };

    let had_trailing_newline = original.ends_with('\n');
    let mut lines: Vec<String> = original.split('\n').map(str::to_string).collect();
    // Drop the empty element produced by a trailing newline so that line
    // counts match standard diff behavior.
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    let replacements = compute_replacements(&lines, path, hunks)?;
    let new_lines = apply_replacements(lines, &replacements);
    let mut contents = new_lines.join("\n");
    if had_trailing_newline {
        contents.push('\n');
    }
    Ok(contents)
}

/// Computes `(start_index, old_len, new_lines)` replacements. The cursor only
/// moves forward: each hunk is searched for after the end of the previous
/// one, so hunks cannot overlap or apply out of order.
fn compute_replacements(
    lines: &[String],
    path: &Path,
    hunks: &[UpdateHunk],
) -> Result<Vec<(usize, usize, Vec<String>)>, ApplyPatchError> {
    let mut replacements: Vec<(usize, usize, Vec<String>)> = Vec::new();
    let mut cursor: usize = 0;

    for hunk in hunks {
        if let Some(context) = &hunk.context {
            match seek_sequence::seek_sequence(lines, &[context.clone()], cursor, false) {
                Some(idx) => cursor = idx + 1,
                None => {
                    return Err(ApplyPatchError::ContextNotFound(format!(
                        "'{context}' in {}",
                        path.display()
                    )));
                }
            }
        }

        if hunk.old_lines.is_empty() {
            // Pure addition: append at the end of file.
            replacements.push((lines.len(), 0, hunk.new_lines.clone()));
            continue;
        }

        // In many real diffs the last element of `old_lines` is an empty
        // string standing for the final newline of the replaced region. That
        // sentinel is absent from `lines`, so retry without it when the
        // direct search fails.
        let mut pattern: &[String] = &hunk.old_lines;
        let mut new_slice: &[String] = &hunk.new_lines;
        let mut found =
            seek_sequence::seek_sequence(lines, pattern, cursor, hunk.is_end_of_file);
        if found.is_none() && pattern.last().is_some_and(String::is_empty) {
            pattern = &pattern[..pattern.len() - 1];
            if new_slice.last().is_some_and(String::is_empty) {
                new_slice = &new_slice[..new_slice.len() - 1];
            }
            found = seek_sequence::seek_sequence(lines, pattern, cursor, hunk.is_end_of_file);
        }

        match found {
            Some(start) => {
                replacements.push((start, pattern.len(), new_slice.to_vec()));
                cursor = start + pattern.len();
            }
            None => {
                return Err(ApplyPatchError::ContextNotFound(format!(
                    "expected lines {:?} in {}",
                    hunk.old_lines,
                    path.display()
                )));
            }
        }
    }

    Ok(replacements)
}

fn apply_replacements(
    mut lines: Vec<String>,
    replacements: &[(usize, usize, Vec<String>)],
) -> Vec<String> {
    // Apply in descending order so earlier replacements do not shift the
    // positions of later ones.
    for (start, old_len, new_segment) in replacements.iter().rev() {
        let start = *start;
        let end = (start + old_len).min(lines.len());
        lines.splice(start..end, new_segment.iter().cloned());
    }
    lines
}
