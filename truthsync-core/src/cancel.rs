//! Caller-initiated cancellation of an in-flight attempt.
//!
//! The handle and token are split so the party driving the attempt holds
//! only the token. Dropping the handle without cancelling leaves the token
//! pending forever; the attempt then runs to its natural outcome.

use once_cell::sync::Lazy;
use tokio::sync::watch;

// Sender backing `CancelToken::never`; held for the process lifetime so the
// shared token stays pending instead of erroring.
static NEVER_TX: Lazy<watch::Sender<bool>> = Lazy::new(|| watch::channel(false).0);

/// Caller-held side: signal abort for an in-flight attempt.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Client-held side: resolves once the paired handle cancels.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that never fires, for attempts without a caller-side handle.
    pub fn never() -> Self {
        Self {
            rx: NEVER_TX.subscribe(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until cancellation is signalled. If the handle was dropped
    /// without cancelling, this future stays pending.
    pub async fn cancelled(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        loop {
            if self.rx.changed().await.is_err() {
                // Handle dropped; cancellation can no longer arrive.
                futures::future::pending::<()>().await;
            }
            if *self.rx.borrow() {
                return;
            }
        }
    }
}

/// Create a linked handle/token pair for one attempt.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}
