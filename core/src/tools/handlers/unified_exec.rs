//! Handlers for `exec_command` and `write_stdin`, the two faces of the
//! unified exec session pool. One implementation, registered under both
//! names.

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
use crate::unified_exec::ExecSessionRequest;
use crate::unified_exec::UnifiedExecResponse;
use crate::unified_exec::WriteStdinRequest;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    ExecCommand,
    WriteStdin,
}

pub struct UnifiedExecHandler {
    mode: Mode,
}

impl UnifiedExecHandler {
    pub fn exec_command() -> Self {
        Self {
            mode: Mode::ExecCommand,
        }
    }

    pub fn write_stdin() -> Self {
        Self {
            mode: Mode::WriteStdin,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecCommandArgs {
    command: String,
    #[serde(default)]
    workdir: Option<String>,
    #[serde(default)]
    yield_time_ms: Option<u64>,
    #[serde(default)]
    max_output_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct WriteStdinArgs {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    chars: String,
    #[serde(default)]
    yield_time_ms: Option<u64>,
    #[serde(default)]
    max_output_bytes: Option<usize>,
}

#[async_trait]
impl ToolHandler for UnifiedExecHandler {
    fn name(&self) -> &'static str {
        match self.mode {
            Mode::ExecCommand => "exec_command",
            Mode::WriteStdin => "write_stdin",
        }
    }

    fn kind(&self) -> ToolKind {
        ToolKind::CommandExecution
    }

    fn describe(&self, invocation: &Invocation) -> ToolResult {
        let mut result = ToolResult::for_kind(ToolKind::CommandExecution);
        match self.mode {
            Mode::ExecCommand => {
                if let Ok(args) =
                    serde_json::from_str::<ExecCommandArgs>(&invocation.call.payload)
                {
                    result.command = args.command;
                }
            }
            Mode::WriteStdin => {
                if let Ok(args) = serde_json::from_str::<WriteStdinArgs>(&invocation.call.payload)
                {
                    result.session_id = args.session_id;
                }
            }
        }
        result
    }

    async fn handle(
        &self,
        cancel: &CancellationToken,
        invocation: &Invocation,
    ) -> Result<ToolResult> {
        match self.mode {
            Mode::ExecCommand => handle_exec_command(cancel, invocation).await,
            Mode::WriteStdin => handle_write_stdin(cancel, invocation).await,
        }
    }
}

async fn handle_exec_command(
    cancel: &CancellationToken,
    invocation: &Invocation,
) -> Result<ToolResult> {
    let args: ExecCommandArgs = parse_arguments("exec_command", &invocation.call.payload)?;
    if args.command.trim().is_empty() {
        return Err(CoreErr::validation("empty command"));
    }

    let cwd = match args.workdir.as_deref().filter(|dir| !dir.is_empty()) {
        Some(dir) => invocation.workdir.join(dir),
        None => invocation.workdir.clone(),
    };
    let argv = invocation.runner.wrap_command(&cwd, &args.command)?;

    let response = invocation
        .unified_exec
        .exec_command(
            ExecSessionRequest {
                command: argv,
                workdir: Some(cwd),
                yield_time_ms: args.yield_time_ms,
                max_output_bytes: args.max_output_bytes,
            },
            cancel,
        )
        .await?;

    Ok(response_to_result(response, args.command))
}

async fn handle_write_stdin(
    cancel: &CancellationToken,
    invocation: &Invocation,
) -> Result<ToolResult> {
    let args: WriteStdinArgs = parse_arguments("write_stdin", &invocation.call.payload)?;
    if args.session_id.is_empty() {
        return Err(CoreErr::validation("missing session_id"));
    }

    let response = invocation
        .unified_exec
        .write_stdin(
            WriteStdinRequest {
                session_id: &args.session_id,
                chars: &args.chars,
                yield_time_ms: args.yield_time_ms,
                max_output_bytes: args.max_output_bytes,
            },
            cancel,
        )
        .await?;

    Ok(response_to_result(response, String::new()))
}

fn response_to_result(response: UnifiedExecResponse, command: String) -> ToolResult {
    let mut result = ToolResult::for_kind(ToolKind::CommandExecution);
    result.command = command;
    result.output = response.output;
    result.session_id = response.session_id.unwrap_or_default();
    result.exit_code = response.exit_code;
    if let Some(code) = response.exit_code
        && code != 0
    {
        result.error = exit_error(code);
    }
    result
}

fn exit_error(code: i32) -> String {
    if code == 127 {
        // 127 is the shell's command-not-found exit status.
        format!(
            "command exited with code {code} (command not found). \
             Check that the tool is installed and on PATH; for Node projects \
             a missing binary often means `npm install` or `pnpm install` has \
             not been run."
        )
    } else {
        format!("command exited with code {code}")
    }
}
