//! One live interactive session: a PTY-attached child plus the background
//! tasks that feed its output ring and watch for exit.
//!
//! Exactly one reader task runs per session. The caller-facing wait in
//! [`UnifiedExecSession::wait_and_collect`] never terminates the child: a
//! caller's cancellation only abandons the current collection window.

use std::sync::Arc;

use gantry_utils_pty::PtyProcessHandle;
use gantry_utils_pty::SpawnedPty;
use tokio::sync::Mutex;
use tokio::sync::Notify;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::NOTIFY_DEBOUNCE;
use super::OUTPUT_RING_CAPACITY;
use super::errors::UnifiedExecError;
use super::ring_buffer::OutputRing;

pub(crate) struct UnifiedExecSession {
    handle: PtyProcessHandle,
    output: Arc<Mutex<OutputRing>>,
    notify: Arc<Notify>,
    done: CancellationToken,
    reader_task: JoinHandle<()>,
    waiter_task: JoinHandle<()>,
}

/// What a collection window produced.
pub(crate) enum CollectOutcome {
    /// The caller's context was canceled; nothing was drained and the
    /// session stays alive.
    Canceled,
    Collected {
        output: Vec<u8>,
    },
}

impl UnifiedExecSession {
    pub(crate) fn new(spawned: SpawnedPty) -> Self {
        let SpawnedPty {
            handle,
            output_rx,
            exit_rx,
        } = spawned;

        let output = Arc::new(Mutex::new(OutputRing::new(OUTPUT_RING_CAPACITY)));
        let notify = Arc::new(Notify::new());
        let done = CancellationToken::new();

        let reader_task = {
            let output = Arc::clone(&output);
            let notify = Arc::clone(&notify);
            let mut rx = output_rx;
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(chunk) => {
                            let mut ring = output.lock().await;
                            ring.extend(&chunk);
                            drop(ring);
                            notify.notify_waiters();
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        let waiter_task = {
            let notify = Arc::clone(&notify);
            let done = done.clone();
            tokio::spawn(async move {
                // The exit code itself is recorded by the PTY wait thread;
                // this task only has to flip the done flag and wake waiters.
                let _ = exit_rx.await;
                notify.notify_waiters();
                done.cancel();
            })
        };

        Self {
            handle,
            output,
            notify,
            done,
            reader_task,
            waiter_task,
        }
    }

    pub(crate) fn has_exited(&self) -> bool {
        self.handle.has_exited()
    }

    pub(crate) fn exit_code(&self) -> Option<i32> {
        self.handle.exit_code()
    }

    /// Writes `bytes` to the child's stdin. A write that races a process
    /// exit is not an error: the exit will surface through the collection
    /// that follows.
    pub(crate) async fn write_stdin(&self, bytes: &[u8]) -> Result<(), UnifiedExecError> {
        if self.handle.writer_sender().send(bytes.to_vec()).await.is_err() {
            if self.has_exited() {
                return Ok(());
            }
            return Err(UnifiedExecError::WriteToStdin);
        }
        Ok(())
    }

    /// One collection window: waits for the first of caller cancellation,
    /// process exit, the yield timer, or fresh output (debounced to coalesce
    /// bursts), then drains up to `max_out` undelivered bytes.
    pub(crate) async fn wait_and_collect(
        &self,
        cancel: &CancellationToken,
        yield_time: Duration,
        max_out: usize,
    ) -> CollectOutcome {
        if cancel.is_cancelled() {
            return CollectOutcome::Canceled;
        }
        let deadline = Instant::now() + yield_time;

        // Output that arrived before this window opened would not trigger
        // the notify; deliver it after the usual debounce.
        let pending = {
            let ring = self.output.lock().await;
            ring.has_undelivered()
        };
        if !pending && !self.done.is_cancelled() {
            tokio::select! {
                _ = cancel.cancelled() => return CollectOutcome::Canceled,
                _ = self.done.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {}
                _ = self.notify.notified() => {}
            }
        }
        // Debounce so a burst of chunks lands in one response; also gives a
        // just-exited process time to flush its last output.
        tokio::time::sleep(NOTIFY_DEBOUNCE).await;

        let mut ring = self.output.lock().await;
        let output = ring.collect(max_out);
        CollectOutcome::Collected { output }
    }

    /// Kills the child and stops the background tasks. Used on eviction and
    /// after the process exited and its output was drained.
    pub(crate) fn terminate(&self) {
        self.handle.terminate();
        self.reader_task.abort();
        self.waiter_task.abort();
    }
}

impl Drop for UnifiedExecSession {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.waiter_task.abort();
    }
}
