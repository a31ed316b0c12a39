//! macOS Seatbelt profile composition.
//!
//! Only `/usr/bin/sandbox-exec` is ever used so that an attacker-controlled
//! PATH cannot substitute a fake wrapper; if that binary has been tampered
//! with, the attacker already has root.

use std::path::Path;
use std::path::PathBuf;

pub(crate) const MACOS_PATH_TO_SEATBELT_EXECUTABLE: &str = "/usr/bin/sandbox-exec";

pub(crate) fn seatbelt_available() -> bool {
    cfg!(target_os = "macos") && Path::new(MACOS_PATH_TO_SEATBELT_EXECUTABLE).exists()
}

/// Arguments for `sandbox-exec`, wrapping `bash -lc command` in a profile
/// that denies everything by default and re-allows process management plus
/// file access under the given roots.
pub(crate) fn create_seatbelt_command_args(
    command: &str,
    roots: &[PathBuf],
    allow_write: bool,
) -> Vec<String> {
    vec![
        "-p".to_string(),
        seatbelt_profile(roots, allow_write),
        "bash".to_string(),
        "-lc".to_string(),
        command.to_string(),
    ]
}

pub(crate) fn seatbelt_profile(roots: &[PathBuf], allow_write: bool) -> String {
    let ops = if allow_write {
        "file-read* file-write*"
    } else {
        "file-read*"
    };
    let subpaths = roots
        .iter()
        .map(|root| format!("(subpath \"{}\")", root.display()))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "(version 1) (deny default) (allow process*) (deny network*)\n(allow {ops} {subpaths})"
    )
}
