//! In-flight handler invocation tracking.
//!
//! # Responsibilities
//! - Generate unique invocation IDs for tracing
//! - Count handler invocations still running for one registration
//! - Let `unroute_all` wait until that count drains to zero

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Global atomic counter for invocation IDs.
/// Relaxed ordering is enough since we only need uniqueness.
static INVOCATION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocationId(u64);

impl InvocationId {
    /// Generate a new unique invocation ID.
    pub fn new() -> Self {
        Self(INVOCATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inv-{}", self.0)
    }
}

/// Tracks running invocations of one handler.
///
/// The count lives in a watch channel so waiters wake on every change
/// instead of polling.
#[derive(Debug, Clone)]
pub struct InvocationTracker {
    active: Arc<watch::Sender<usize>>,
}

impl InvocationTracker {
    /// Create a new invocation tracker.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new running invocation. Returns a guard that decrements on drop.
    pub fn track(&self) -> InvocationGuard {
        self.active.send_modify(|count| *count += 1);
        InvocationGuard {
            active: Arc::clone(&self.active),
            id: InvocationId::new(),
        }
    }

    /// Get the current number of running invocations.
    pub fn active_count(&self) -> usize {
        *self.active.borrow()
    }

    /// Wait until no invocation is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        if rx.wait_for(|count| *count == 0).await.is_err() {
            tracing::trace!("invocation tracker dropped while waiting");
        }
    }
}

impl Default for InvocationTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks one invocation's lifetime.
/// Decrements the running count when dropped, including on panic unwind.
#[derive(Debug)]
pub struct InvocationGuard {
    active: Arc<watch::Sender<usize>>,
    id: InvocationId,
}

impl InvocationGuard {
    /// Get this invocation's ID.
    pub fn id(&self) -> InvocationId {
        self.id
    }
}

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        self.active.send_modify(|count| *count = count.saturating_sub(1));
        tracing::trace!(invocation_id = %self.id, "Invocation finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn invocation_id_unique() {
        let id1 = InvocationId::new();
        let id2 = InvocationId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn invocation_tracker_counts() {
        let tracker = InvocationTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_after_last_guard() {
        let tracker = InvocationTracker::new();
        let guard = tracker.track();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn wait_idle_is_immediate_when_idle() {
        let tracker = InvocationTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.wait_idle())
            .await
            .unwrap();
    }
}
