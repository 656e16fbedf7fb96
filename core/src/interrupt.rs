use std::sync::Arc;
use tokio::sync::watch;

/// Host-side interruption of a running post-build task. Clones share state.
#[derive(Debug, Clone)]
pub struct InterruptSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl InterruptSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`interrupt`](Self::interrupt) has been called. Cancel safe.
    pub async fn interrupted(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|interrupted| *interrupted).await;
    }

    /// Interrupts on Ctrl-C for as long as the returned task runs.
    pub fn interrupt_on_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal.interrupt();
            }
        })
    }
}

impl Default for InterruptSignal {
    fn default() -> Self {
        Self::new()
    }
}
