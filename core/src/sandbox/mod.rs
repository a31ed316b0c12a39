//! Sandbox runner: wraps command execution and patch application with
//! OS-specific isolation and path-root enforcement.
//!
//! Isolation is best effort by platform (Seatbelt on macOS, `landlock-run`
//! on Linux, documented degradation elsewhere); path containment is not.
//! A workdir or patch target that escapes the configured roots is refused
//! before anything is spawned or written.

mod landlock;
mod paths;
mod seatbelt;

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use gantry_protocol::SandboxMode;
use tracing::warn;

use crate::error::CoreErr;
use crate::error::SandboxErr;
use crate::exec::ExecParams;
use crate::policy::READ_ONLY_COMMAND_BLOCKED;
use crate::policy::READ_ONLY_WRITE_BLOCKED;

pub const PATH_ESCAPE_REASON: &str = "patch references paths outside workspace";

/// Output of a sandboxed command run.
#[derive(Debug)]
pub struct CommandOutput {
    /// Combined stdout and stderr.
    pub output: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct SandboxRunner {
    mode: SandboxMode,
    roots: Vec<PathBuf>,
}

impl SandboxRunner {
    /// Builds a runner for `mode` restricted to `roots`. Roots are
    /// normalized against the process working directory.
    pub fn new(mode: SandboxMode, roots: Vec<PathBuf>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let roots = roots
            .into_iter()
            .map(|root| paths::absolutize(&root, &cwd))
            .collect();
        Self { mode, roots }
    }

    /// Runner used for approved retry-without-sandbox attempts.
    pub fn full_access() -> Self {
        Self {
            mode: SandboxMode::DangerFullAccess,
            roots: Vec::new(),
        }
    }

    pub fn mode(&self) -> SandboxMode {
        self.mode
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The argv to execute for `command` under this runner's isolation,
    /// or a refusal. Containment of `workdir` is checked here, before any
    /// process is spawned; unified-exec sessions use this too.
    pub fn wrap_command(&self, workdir: &Path, command: &str) -> Result<Vec<String>, SandboxErr> {
        if self.mode == SandboxMode::ReadOnly {
            return Err(SandboxErr::denied(READ_ONLY_COMMAND_BLOCKED));
        }
        if !self.roots.is_empty() {
            if workdir.as_os_str().is_empty() {
                return Err(SandboxErr::denied("command requires a workdir"));
            }
            let workdir = paths::absolutize(workdir, workdir);
            if !paths::contained_in_any(&workdir, &self.roots) {
                return Err(SandboxErr::denied(
                    "workdir is outside the configured sandbox roots",
                ));
            }
        }
        if self.mode == SandboxMode::DangerFullAccess {
            return Ok(bare_shell(command));
        }

        let effective_roots = self.effective_roots(workdir);
        let allow_write = self.mode == SandboxMode::WorkspaceWrite;
        if seatbelt::seatbelt_available() {
            let mut argv = vec![seatbelt::MACOS_PATH_TO_SEATBELT_EXECUTABLE.to_string()];
            argv.extend(seatbelt::create_seatbelt_command_args(
                command,
                &effective_roots,
                allow_write,
            ));
            return Ok(argv);
        }
        if landlock::landlock_available() {
            let mut argv = vec![landlock::LINUX_SANDBOX_WRAPPER.to_string()];
            argv.extend(landlock::create_landlock_command_args(
                command,
                &effective_roots,
                allow_write,
            ));
            return Ok(argv);
        }
        warn!("no platform sandbox wrapper available; running command unwrapped");
        Ok(bare_shell(command))
    }

    /// Runs `command` to completion under this runner's isolation, with a
    /// 30-minute default deadline when the caller supplies none. The child's
    /// lifetime is tied to this call.
    pub async fn run_command(
        &self,
        workdir: &Path,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CoreErr> {
        let argv = self.wrap_command(workdir, command)?;
        let out = crate::exec::run_command(ExecParams {
            command: argv,
            cwd: workdir.to_path_buf(),
            timeout,
            env: std::env::vars().collect(),
        })
        .await?;
        Ok(CommandOutput {
            output: out.aggregated(),
            exit_code: out.exit_code,
            timed_out: out.timed_out,
            duration: out.duration,
        })
    }

    /// Applies `patch` (custom format or unified diff) under path-root
    /// enforcement, returning a summary of the changed files.
    pub async fn apply_patch(&self, workdir: &Path, patch: &str) -> Result<String, CoreErr> {
        if self.mode == SandboxMode::ReadOnly {
            return Err(SandboxErr::denied(READ_ONLY_WRITE_BLOCKED).into());
        }
        if !self.roots.is_empty() && workdir.as_os_str().is_empty() {
            return Err(SandboxErr::denied("patch requires a workdir").into());
        }
        if self.mode != SandboxMode::DangerFullAccess {
            let allowed = self.effective_roots(workdir);
            for raw in gantry_apply_patch::referenced_paths(patch) {
                let resolved = paths::absolutize(Path::new(&raw), workdir);
                if !paths::contained_in_any(&resolved, &allowed) {
                    return Err(SandboxErr::denied(PATH_ESCAPE_REASON).into());
                }
            }
        }
        let summary = gantry_apply_patch::apply_patch_text(workdir, patch).await?;
        Ok(summary)
    }

    /// The root set isolation profiles are built from: the configured roots,
    /// or just the workdir when none are configured.
    fn effective_roots(&self, workdir: &Path) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            vec![paths::absolutize(workdir, workdir)]
        } else {
            self.roots.clone()
        }
    }
}

fn bare_shell(command: &str) -> Vec<String> {
    vec!["bash".to_string(), "-lc".to_string(), command.to_string()]
}

/// Environment for interactive sessions: no pagers, no color, no terminal
/// prompts from git.
pub(crate) fn session_env() -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    for (key, value) in [
        ("NO_COLOR", "1"),
        ("TERM", "dumb"),
        ("PAGER", "cat"),
        ("GIT_PAGER", "cat"),
        ("LANG", "C"),
        ("LC_ALL", "C"),
        ("GIT_TERMINAL_PROMPT", "0"),
    ] {
        env.insert(key.to_string(), value.to_string());
    }
    env
}
