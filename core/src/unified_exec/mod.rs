//! Unified exec: a bounded pool of long-lived interactive shell sessions.
//!
//! `exec_command` starts a process on a fresh PTY and collects whatever
//! output shows up within the yield window; if the process is still running,
//! the session stays in the table and `write_stdin` continues the
//! conversation. Output is ring-buffered (oldest bytes discarded) and
//! delivered incrementally by absolute offset, so nothing is ever repeated.
//!
//! Caller cancellation governs only the current collection window. The
//! child process is terminated only by session eviction, natural exit, or
//! explicit cleanup.

mod errors;
mod ring_buffer;
mod session;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use gantry_utils_pty::spawn_pty_process;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;
use uuid::Uuid;

pub use errors::UnifiedExecError;
use session::CollectOutcome;
use session::UnifiedExecSession;

use crate::sandbox::session_env;

pub(crate) const MAX_SESSIONS: usize = 64;
pub(crate) const OUTPUT_RING_CAPACITY: usize = 1024 * 1024; // 1 MiB
pub(crate) const NOTIFY_DEBOUNCE: Duration = Duration::from_millis(50);

const DEFAULT_YIELD_TIME_MS: u64 = 5_000;
const MIN_YIELD_TIME_MS: u64 = 50;
const MAX_YIELD_TIME_MS: u64 = 30_000;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Request to start a new interactive session. `command` is the full argv,
/// already wrapped by the sandbox runner.
#[derive(Debug)]
pub struct ExecSessionRequest {
    pub command: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub yield_time_ms: Option<u64>,
    pub max_output_bytes: Option<usize>,
}

#[derive(Debug)]
pub struct WriteStdinRequest<'a> {
    pub session_id: &'a str,
    pub chars: &'a str,
    pub yield_time_ms: Option<u64>,
    pub max_output_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedExecResponse {
    pub output: String,
    /// Set while the process is still running; `None` once it exited and
    /// the session was closed.
    pub session_id: Option<String>,
    pub exit_code: Option<i32>,
}

struct SessionEntry {
    session: Arc<UnifiedExecSession>,
    last_used: Instant,
}

#[derive(Default)]
pub struct UnifiedExecManager {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl UnifiedExecManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn exec_command(
        &self,
        request: ExecSessionRequest,
        cancel: &CancellationToken,
    ) -> Result<UnifiedExecResponse, UnifiedExecError> {
        if request.command.is_empty() {
            return Err(UnifiedExecError::MissingCommandLine);
        }
        let cwd = match request.workdir {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(UnifiedExecError::create_session)?,
        };
        let env = session_env();
        let spawned = spawn_pty_process(&request.command[0], &request.command[1..], &cwd, &env)
            .await
            .map_err(UnifiedExecError::create_session)?;

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(UnifiedExecSession::new(spawned));
        self.insert_session(id.clone(), Arc::clone(&session)).await?;
        debug!("unified exec session {id} started");

        self.collect(&id, &session, cancel, request.yield_time_ms, request.max_output_bytes)
            .await
    }

    pub async fn write_stdin(
        &self,
        request: WriteStdinRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<UnifiedExecResponse, UnifiedExecError> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            let entry = sessions.get_mut(request.session_id).ok_or_else(|| {
                UnifiedExecError::UnknownSessionId {
                    session_id: request.session_id.to_string(),
                }
            })?;
            entry.last_used = Instant::now();
            Arc::clone(&entry.session)
        };

        if !request.chars.is_empty() {
            session.write_stdin(request.chars.as_bytes()).await?;
        }

        self.collect(
            request.session_id,
            &session,
            cancel,
            request.yield_time_ms,
            request.max_output_bytes,
        )
        .await
    }

    /// Number of live sessions; exposed for eviction telemetry and tests.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn collect(
        &self,
        id: &str,
        session: &Arc<UnifiedExecSession>,
        cancel: &CancellationToken,
        yield_time_ms: Option<u64>,
        max_output_bytes: Option<usize>,
    ) -> Result<UnifiedExecResponse, UnifiedExecError> {
        let yield_time = Duration::from_millis(
            yield_time_ms
                .unwrap_or(DEFAULT_YIELD_TIME_MS)
                .clamp(MIN_YIELD_TIME_MS, MAX_YIELD_TIME_MS),
        );
        let max_out = max_output_bytes.unwrap_or(DEFAULT_MAX_OUTPUT_BYTES);

        match session.wait_and_collect(cancel, yield_time, max_out).await {
            CollectOutcome::Canceled => Ok(UnifiedExecResponse {
                output: String::new(),
                session_id: Some(id.to_string()),
                exit_code: None,
            }),
            CollectOutcome::Collected { output } => {
                let output = String::from_utf8_lossy(&output).to_string();
                if session.has_exited() {
                    self.remove_session(id).await;
                    Ok(UnifiedExecResponse {
                        output,
                        session_id: None,
                        exit_code: Some(session.exit_code().unwrap_or(-1)),
                    })
                } else {
                    Ok(UnifiedExecResponse {
                        output,
                        session_id: Some(id.to_string()),
                        exit_code: None,
                    })
                }
            }
        }
    }

    async fn insert_session(
        &self,
        id: String,
        session: Arc<UnifiedExecSession>,
    ) -> Result<(), UnifiedExecError> {
        let evicted = {
            let mut sessions = self.sessions.lock().await;
            let mut evicted: Option<Arc<UnifiedExecSession>> = None;
            if sessions.len() >= MAX_SESSIONS {
                // Prefer a session whose process already exited; otherwise
                // drop the least recently used one.
                let victim = sessions
                    .iter()
                    .find(|(_, entry)| entry.session.has_exited())
                    .map(|(key, _)| key.clone())
                    .or_else(|| {
                        sessions
                            .iter()
                            .min_by_key(|(_, entry)| entry.last_used)
                            .map(|(key, _)| key.clone())
                    });
                if let Some(victim) = victim {
                    warn!("evicting unified exec session {victim}");
                    evicted = sessions.remove(&victim).map(|entry| entry.session);
                }
            }
            if sessions.len() >= MAX_SESSIONS {
                return Err(UnifiedExecError::TooManySessions);
            }
            sessions.insert(
                id,
                SessionEntry {
                    session,
                    last_used: Instant::now(),
                },
            );
            evicted
        };
        // Killing the evicted child happens outside the table lock.
        if let Some(evicted) = evicted {
            evicted.terminate();
        }
        Ok(())
    }

    async fn remove_session(&self, id: &str) {
        let removed = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(id)
        };
        if let Some(entry) = removed {
            entry.session.terminate();
            debug!("unified exec session {id} closed");
        }
    }
}
