//! Per-session cancellation token.

use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative cancellation for one capture session.
///
/// Clones share state. Each session creates its own token, so a late
/// callback from a previous session can never observe (or flip) the state
/// of the next one.
#[derive(Clone, Debug)]
pub struct SessionToken {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_if_modified(|cancelled| !std::mem::replace(cancelled, true));
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}
