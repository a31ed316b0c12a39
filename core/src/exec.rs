//! Low-level child process execution for the sandbox runner: spawn with a
//! controlled environment, capture capped output, and enforce a deadline.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::BufReader;
use tokio::process::Command;

// Caps applied to each captured stream.
const MAX_STREAM_OUTPUT: usize = 64 * 1024;
const MAX_STREAM_OUTPUT_LINES: usize = 1024;

/// Commands with no caller-supplied deadline still must terminate.
pub(crate) const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Debug, Clone)]
pub(crate) struct ExecParams {
    pub command: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
    pub env: HashMap<String, String>,
}

#[derive(Debug)]
pub(crate) struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ExecOutput {
    /// Combined stdout and stderr, the form surfaced in tool results.
    pub fn aggregated(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Runs `params.command` to completion, killing it at the deadline. The
/// child's lifetime is tied to this call.
pub(crate) async fn run_command(params: ExecParams) -> io::Result<ExecOutput> {
    let ExecParams {
        command,
        cwd,
        timeout,
        env,
    } = params;
    let Some((program, args)) = command.split_first() else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "command args are empty",
        ));
    };

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.current_dir(cwd);
    for (key, value) in &env {
        cmd.env(key, value);
    }
    // No stdin descriptor: some tools try to read from an open stdin and
    // hang forever waiting for input.
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    let stdout_reader = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout pipe was unexpectedly not available"))?;
    let stderr_reader = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr pipe was unexpectedly not available"))?;

    let stdout_handle = tokio::spawn(read_capped(
        BufReader::new(stdout_reader),
        MAX_STREAM_OUTPUT,
        MAX_STREAM_OUTPUT_LINES,
    ));
    let stderr_handle = tokio::spawn(read_capped(
        BufReader::new(stderr_reader),
        MAX_STREAM_OUTPUT,
        MAX_STREAM_OUTPUT_LINES,
    ));

    let deadline = timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT);
    let (exit_code, timed_out) = match tokio::time::timeout(deadline, child.wait()).await {
        Ok(status) => (status?.code().unwrap_or(-1), false),
        Err(_) => {
            child.start_kill()?;
            let _ = child.wait().await;
            (TIMEOUT_EXIT_CODE, true)
        }
    };

    let stdout = stdout_handle
        .await
        .map_err(|err| io::Error::other(err.to_string()))??;
    let stderr = stderr_handle
        .await
        .map_err(|err| io::Error::other(err.to_string()))??;

    Ok(ExecOutput {
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
        exit_code,
        timed_out,
        duration: start.elapsed(),
    })
}

async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    max_output: usize,
    max_lines: usize,
) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(max_output.min(8 * 1024));
    let mut tmp = [0u8; 8192];

    let mut remaining_bytes = max_output;
    let mut remaining_lines = max_lines;

    loop {
        let n = reader.read(&mut tmp).await?;
        if n == 0 {
            break;
        }
        // Keep reading to EOF to avoid back-pressure on the child, but stop
        // copying once either cap is hit.
        if remaining_bytes > 0 && remaining_lines > 0 {
            let mut copy_len = 0;
            for &byte in &tmp[..n] {
                if remaining_bytes == 0 || remaining_lines == 0 {
                    break;
                }
                copy_len += 1;
                remaining_bytes -= 1;
                if byte == b'\n' {
                    remaining_lines -= 1;
                }
            }
            buf.extend_from_slice(&tmp[..copy_len]);
        }
    }

    Ok(buf)
}
