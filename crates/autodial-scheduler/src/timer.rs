//! Tokio-backed delay timer.
//! One sleep task at a time; expiry sends the ticket back to the session task.

use std::time::Duration;

use autodial_core::DelayTimer;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delay timer that delivers expired tickets on a channel.
/// Must be armed from inside a tokio runtime.
pub struct TokioTimer {
    ticks: mpsc::UnboundedSender<u64>,
    pending: Option<JoinHandle<()>>,
}

impl TokioTimer {
    pub fn new(ticks: mpsc::UnboundedSender<u64>) -> Self {
        Self {
            ticks,
            pending: None,
        }
    }

    /// Create a timer and the receiver its tickets arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl DelayTimer for TokioTimer {
    fn arm(&mut self, ticket: u64, delay: Duration) {
        self.cancel();
        let ticks = self.ticks.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session shut down.
            let _ = ticks.send(ticket);
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
