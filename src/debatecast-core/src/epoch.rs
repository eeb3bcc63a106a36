//! Session generation token.
//!
//! Every reset advances the epoch. Work captured under an older epoch
//! (queued narration, in-flight remote calls) must not touch the new session.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared, cloneable generation counter.
#[derive(Debug, Clone)]
pub struct Epoch {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new()
    }
}

impl Epoch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Advance to a new generation and return it.
    pub fn advance(&self) -> u64 {
        let mut next = 0;
        self.tx.send_modify(|value| {
            *value += 1;
            next = *value;
        });
        next
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }

    /// Resolve once the epoch moves past `epoch`.
    pub async fn superseded(&self, epoch: u64) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot fail here.
        let _ = rx.wait_for(|current| *current != epoch).await;
    }
}
