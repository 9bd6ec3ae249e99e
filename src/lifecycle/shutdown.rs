//! Graceful shutdown signalling.
//!
//! One [`Shutdown`] lives in `main`; every long-running task holds a
//! [`ShutdownListener`]. Triggering is idempotent, and a listener that
//! subscribes after the trigger still observes it immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Broadcasts a one-time stop signal to every subscribed task.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    fired: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Hand out one task's view of the stop signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
            fired: self.fired.clone(),
        }
    }

    /// Signal every listener, current and future. Idempotent.
    pub fn trigger(&self) {
        self.fired.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    /// Whether the stop signal has already been raised.
    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// One task's handle on the stop signal.
pub struct ShutdownListener {
    rx: broadcast::Receiver<()>,
    fired: Arc<AtomicBool>,
}

impl ShutdownListener {
    /// Suspend until the stop signal is raised.
    ///
    /// Resolves immediately when the trigger already fired, including the
    /// case where this listener was created after the fact.
    pub async fn recv(&mut self) {
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        // Err means the sender is gone, which only happens on teardown;
        // treat it as a stop signal too.
        let _ = self.rx.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_all_listeners() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), a.recv())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), b.recv())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_subscriber_still_observes_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.is_triggered());

        let mut late = shutdown.subscribe();
        tokio::time::timeout(Duration::from_secs(1), late.recv())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();

        let mut listener = shutdown.subscribe();
        tokio::time::timeout(Duration::from_secs(1), listener.recv())
            .await
            .unwrap();
    }
}
