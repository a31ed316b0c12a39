//! Broker for human approval decisions.
//!
//! A tool task calls [`ApprovalStore::wait`] and suspends; the UI resolves
//! the approval by id through [`ApprovalStore::resolve`]. Resolutions that
//! arrive before anyone waits are remembered in a bounded map so a late
//! waiter still sees them.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound on remembered decisions. Oldest entries are evicted first.
const MAX_DECIDED_ENTRIES: usize = 256;

#[derive(Default)]
struct ApprovalState {
    waiters: HashMap<String, oneshot::Sender<bool>>,
    decided: HashMap<String, bool>,
    decided_order: VecDeque<String>,
}

#[derive(Default)]
pub struct ApprovalStore {
    state: Mutex<ApprovalState>,
}

/// Outcome of a wait: the decision, or the caller gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Approved,
    Denied,
    Canceled,
}

impl ApprovalStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ApprovalState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Blocks until the approval `id` is resolved or `cancel` fires. If the
    /// decision was already recorded, returns immediately.
    pub async fn wait(&self, id: &str, cancel: &CancellationToken) -> WaitOutcome {
        let rx = {
            let mut state = self.lock_state();
            if let Some(approved) = state.decided.get(id) {
                return if *approved {
                    WaitOutcome::Approved
                } else {
                    WaitOutcome::Denied
                };
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.insert(id.to_string(), tx);
            rx
        };

        tokio::select! {
            decision = rx => match decision {
                Ok(true) => WaitOutcome::Approved,
                Ok(false) => WaitOutcome::Denied,
                // Sender dropped without resolving; treat as denial.
                Err(_) => WaitOutcome::Denied,
            },
            _ = cancel.cancelled() => {
                self.lock_state().waiters.remove(id);
                WaitOutcome::Canceled
            }
        }
    }

    /// Resolves the approval `id`. Hands the value to a pending waiter if one
    /// exists; otherwise records it for a late waiter. Duplicate resolutions
    /// are no-ops once a waiter has been drained.
    pub fn resolve(&self, id: &str, approved: bool) {
        let mut state = self.lock_state();
        if state.decided.contains_key(id) {
            return;
        }
        if let Some(waiter) = state.waiters.remove(id)
            && waiter.send(approved).is_err()
        {
            debug!("approval waiter for {id} vanished before resolution");
        }
        // Record the decision either way so a duplicate resolve is a no-op
        // and a late wait still sees the value.
        state.decided.insert(id.to_string(), approved);
        state.decided_order.push_back(id.to_string());
        while state.decided.len() > MAX_DECIDED_ENTRIES {
            if let Some(oldest) = state.decided_order.pop_front() {
                state.decided.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resolve_releases_waiter() {
        let store = ApprovalStore::new();
        let cancel = CancellationToken::new();
        let waiter = {
            let store = Arc::clone(&store);
            let cancel = cancel.clone();
            tokio::spawn(async move { store.wait("a-1", &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.resolve("a-1", true);
        assert_eq!(waiter.await.expect("join"), WaitOutcome::Approved);
    }

    #[tokio::test]
    async fn early_resolution_is_seen_by_late_waiter() {
        let store = ApprovalStore::new();
        store.resolve("a-2", false);
        let cancel = CancellationToken::new();
        assert_eq!(store.wait("a-2", &cancel).await, WaitOutcome::Denied);
    }

    #[tokio::test]
    async fn duplicate_resolution_is_a_noop() {
        let store = ApprovalStore::new();
        let cancel = CancellationToken::new();
        let waiter = {
            let store = Arc::clone(&store);
            let cancel = cancel.clone();
            tokio::spawn(async move { store.wait("a-3", &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.resolve("a-3", true);
        store.resolve("a-3", false);
        assert_eq!(waiter.await.expect("join"), WaitOutcome::Approved);
        // The duplicate must not overwrite the delivered decision.
        let cancel = CancellationToken::new();
        assert_eq!(store.wait("a-3", &cancel).await, WaitOutcome::Approved);
    }

    #[tokio::test]
    async fn cancellation_releases_the_waiter() {
        let store = ApprovalStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(store.wait("a-4", &cancel).await, WaitOutcome::Canceled);
    }

    #[tokio::test]
    async fn decided_map_evicts_oldest_first() {
        let store = ApprovalStore::new();
        for i in 0..(MAX_DECIDED_ENTRIES + 10) {
            store.resolve(&format!("a-{i}"), true);
        }
        let cancel = CancellationToken::new();
        cancel.cancel();
        // The earliest entries were evicted, so a late wait on them cancels
        // instead of returning a decision.
        assert_eq!(store.wait("a-0", &cancel).await, WaitOutcome::Canceled);
        // Recent entries survive.
        let cancel = CancellationToken::new();
        let last = format!("a-{}", MAX_DECIDED_ENTRIES + 9);
        assert_eq!(store.wait(&last, &cancel).await, WaitOutcome::Approved);
    }
}
