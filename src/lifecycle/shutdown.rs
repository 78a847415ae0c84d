//! Close signal shared by pages, contexts and the intercept server.

use std::sync::Arc;
use tokio::sync::watch;

/// One-way close signal.
///
/// Backed by a watch channel so subscribers that arrive after the trigger
/// still observe the closed state.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new, untriggered signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Trigger the signal. Returns true for the call that actually flipped it.
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has been triggered.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|closed| *closed).await.is_err() {
            // Sender lives in `self`, so this cannot happen while we are borrowed.
            tracing::trace!("close signal sender dropped");
        }
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
