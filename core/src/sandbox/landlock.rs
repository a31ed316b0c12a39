//! Linux sandbox wrapping via the `landlock-run` helper.
//!
//! The helper performs the actual filesystem restriction (Landlock LSM)
//! after parsing its CLI flags; we only translate the configured roots into
//! the equivalent invocation. When the helper is not installed the runner
//! executes the command unwrapped and logs the degradation.

use std::path::PathBuf;

pub(crate) const LINUX_SANDBOX_WRAPPER: &str = "landlock-run";

pub(crate) fn landlock_available() -> bool {
    cfg!(target_os = "linux") && which::which(LINUX_SANDBOX_WRAPPER).is_ok()
}

/// Arguments for `landlock-run`, wrapping `bash -lc command` with one
/// `--ro`/`--rw` grant per root. A `--` separator keeps command arguments
/// starting with `-` from being parsed as helper options.
pub(crate) fn create_landlock_command_args(
    command: &str,
    roots: &[PathBuf],
    allow_write: bool,
) -> Vec<String> {
    let flag = if allow_write { "--rw" } else { "--ro" };
    let mut args: Vec<String> = Vec::with_capacity(roots.len() * 2 + 4);
    for root in roots {
        args.push(flag.to_string());
        args.push(root.display().to_string());
    }
    args.push("--".to_string());
    args.push("bash".to_string());
    args.push("-lc".to_string());
    args.push(command.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn grants_one_flag_per_root() {
        let roots = vec![PathBuf::from("/w1"), PathBuf::from("/w2")];
        let args = create_landlock_command_args("make check", &roots, true);
        assert_eq!(
            args,
            vec!["--rw", "/w1", "--rw", "/w2", "--", "bash", "-lc", "make check"]
        );
    }

    #[test]
    fn read_only_uses_ro_grants() {
        let args = create_landlock_command_args("ls", &[PathBuf::from("/w")], false);
        assert_eq!(args[0], "--ro");
    }
}
