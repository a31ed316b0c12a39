use core::fmt;
use std::io;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use portable_pty::MasterPty;
use portable_pty::SlavePty;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub(crate) trait ChildTerminator: Send + Sync {
    fn kill(&mut self) -> io::Result<()>;
}

pub(crate) struct PtyHandles {
    // The slave must stay open on some platforms or the child receives a
    // hangup as soon as spawning completes.
    pub(crate) _slave: Option<Box<dyn SlavePty + Send>>,
    pub(crate) _master: Box<dyn MasterPty + Send>,
}

pub(crate) struct HandleParts {
    pub(crate) writer_tx: mpsc::Sender<Vec<u8>>,
    pub(crate) killer: Box<dyn ChildTerminator>,
    pub(crate) reader_handle: JoinHandle<()>,
    pub(crate) writer_handle: JoinHandle<()>,
    pub(crate) wait_handle: JoinHandle<()>,
    pub(crate) exited: Arc<AtomicBool>,
    pub(crate) exit_code: Arc<StdMutex<Option<i32>>>,
    pub(crate) pty_handles: PtyHandles,
}

/// Handle for driving an interactive PTY process. Owns the child, the PTY
/// pair, and the reader/writer/wait helper tasks; all of them are released
/// exactly once, either through [`PtyProcessHandle::terminate`] or on drop.
pub struct PtyProcessHandle {
    writer_tx: mpsc::Sender<Vec<u8>>,
    killer: StdMutex<Option<Box<dyn ChildTerminator>>>,
    reader_handle: StdMutex<Option<JoinHandle<()>>>,
    writer_handle: StdMutex<Option<JoinHandle<()>>>,
    wait_handle: StdMutex<Option<JoinHandle<()>>>,
    exited: Arc<AtomicBool>,
    exit_code: Arc<StdMutex<Option<i32>>>,
    _pty_handles: StdMutex<Option<PtyHandles>>,
}

impl fmt::Debug for PtyProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtyProcessHandle")
            .field("exited", &self.has_exited())
            .finish()
    }
}

impl PtyProcessHandle {
    pub(crate) fn new(parts: HandleParts) -> Self {
        Self {
            writer_tx: parts.writer_tx,
            killer: StdMutex::new(Some(parts.killer)),
            reader_handle: StdMutex::new(Some(parts.reader_handle)),
            writer_handle: StdMutex::new(Some(parts.writer_handle)),
            wait_handle: StdMutex::new(Some(parts.wait_handle)),
            exited: parts.exited,
            exit_code: parts.exit_code,
            _pty_handles: StdMutex::new(Some(parts.pty_handles)),
        }
    }

    /// Channel for writing raw bytes to the child's stdin.
    pub fn writer_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.writer_tx.clone()
    }

    /// True once the child process has exited.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// The child's exit code, when known.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.lock().ok().and_then(|guard| *guard)
    }

    /// Kills the child and aborts the helper tasks. Idempotent.
    pub fn terminate(&self) {
        if let Ok(mut killer) = self.killer.lock()
            && let Some(mut killer) = killer.take()
        {
            let _ = killer.kill();
        }
        for slot in [&self.reader_handle, &self.writer_handle, &self.wait_handle] {
            if let Ok(mut handle) = slot.lock()
                && let Some(handle) = handle.take()
            {
                handle.abort();
            }
        }
    }
}

impl Drop for PtyProcessHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Bundle returned by [`crate::spawn_pty_process`].
#[derive(Debug)]
pub struct SpawnedPty {
    pub handle: PtyProcessHandle,
    /// Stdout/stderr chunks as read from the PTY master.
    pub output_rx: broadcast::Receiver<Vec<u8>>,
    /// Resolves once with the child's exit code.
    pub exit_rx: oneshot::Receiver<i32>,
}
