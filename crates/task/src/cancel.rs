use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative cancellation shared by the scheduler and the command runners.
///
/// Once set the flag stays set. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Only fails when the sender is gone, which `self` prevents
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
