//! Interactive process spawning on a PTY.
//!
//! [`spawn_pty_process`] starts a child attached to a fresh pseudo-terminal
//! and returns a [`PtyProcessHandle`] plus channels for output chunks and
//! exit notification. The handle owns every helper task and the PTY pair;
//! dropping it terminates the child.

mod process;
mod pty;

pub use process::PtyProcessHandle;
pub use process::SpawnedPty;
pub use pty::spawn_pty_process;
