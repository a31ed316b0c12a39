//! Workspace file listing for the `file_search` tool.
//!
//! Walks a directory tree with the same ignore semantics the rest of the
//! ecosystem uses (the `ignore` crate), skips well-known build and VCS
//! directories, and caps the number of entries returned so a pathological
//! workspace cannot flood the model context.

use ignore::WalkBuilder;
use serde::Serialize;
use std::num::NonZero;
use std::path::Path;
use std::path::PathBuf;

/// Directories never descended into, independent of gitignore rules.
pub const SKIPPED_DIRECTORIES: [&str; 5] = [".git", "node_modules", ".idea", "target", "vendor"];

const DEFAULT_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the search root.
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub limit: NonZero<usize>,
    pub respect_gitignore: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            #[allow(clippy::unwrap_used)]
            limit: NonZero::new(DEFAULT_LIMIT).unwrap(),
            respect_gitignore: true,
        }
    }
}

#[derive(Debug)]
pub struct ListResults {
    pub entries: Vec<FileEntry>,
    /// True when the walk stopped at the limit rather than exhausting the
    /// tree.
    pub truncated: bool,
}

/// Lists files under `root`, sorted by relative path, at most
/// `options.limit` entries.
pub fn list_files(root: &Path, options: &ListOptions) -> ListResults {
    let limit = options.limit.get();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(options.respect_gitignore)
        .git_global(false)
        .require_git(false)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !SKIPPED_DIRECTORIES.contains(&name.as_ref())
        })
        .build();

    let mut entries: Vec<FileEntry> = Vec::new();
    let mut truncated = false;
    for entry in walker {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if entries.len() >= limit {
            truncated = true;
            break;
        }
        entries.push(FileEntry {
            path: relative.to_path_buf(),
        });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    ListResults { entries, truncated }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn lists_files_and_skips_known_directories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.rs"), "").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        for skipped in ["node_modules", "target", ".git"] {
            fs::create_dir_all(dir.path().join(skipped)).unwrap();
            fs::write(dir.path().join(skipped).join("hidden.txt"), "").unwrap();
        }

        let results = list_files(dir.path(), &ListOptions::default());
        let paths: Vec<String> = results
            .entries
            .iter()
            .map(|e| e.path.display().to_string())
            .collect();
        assert_eq!(paths, vec!["main.rs", "src/lib.rs"]);
        assert!(!results.truncated);
    }

    #[test]
    fn walk_stops_at_limit() {
        let dir = tempdir().unwrap();
        for i in 0..10 {
            fs::write(dir.path().join(format!("f{i}.txt")), "").unwrap();
        }
        let options = ListOptions {
            limit: NonZero::new(3).unwrap(),
            ..ListOptions::default()
        };
        let results = list_files(dir.path(), &options);
        assert_eq!(results.entries.len(), 3);
        assert!(results.truncated);
    }
}
