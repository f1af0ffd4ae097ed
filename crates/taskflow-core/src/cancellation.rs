//! Cooperative cancellation token.
//!
//! A token is only a flag plus an optional reason. Nothing in the task graph
//! watches it: leaf actions poll `throw_if_cancellation_requested()` (or
//! await `cancelled()`) themselves. Clones share the same signal, so one
//! token can be handed to several independent task graphs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::CancellationError;

#[derive(Debug, Clone, Default)]
struct Signal {
    requested: bool,
    reason: Option<String>,
}

#[derive(Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<Signal>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Signal::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.tx.borrow().requested
    }

    pub fn cancellation_reason(&self) -> Option<String> {
        self.tx.borrow().reason.clone()
    }

    /// Request cancellation without a reason.
    pub fn cancel(&self) {
        self.request(None);
    }

    /// Request cancellation. Calling again replaces the reason.
    pub fn cancel_with_reason(&self, reason: impl Into<String>) {
        self.request(Some(reason.into()));
    }

    /// Schedule a cancellation on the current tokio runtime.
    pub fn cancel_after(&self, delay: Duration, reason: Option<String>) -> JoinHandle<()> {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.request(reason);
        })
    }

    /// `Err(CancellationError)` once cancellation has been requested.
    ///
    /// Meant to be used with `?` inside a leaf action, which turns the task
    /// `Cancelled`.
    pub fn throw_if_cancellation_requested(&self) -> Result<(), CancellationError> {
        let signal = self.tx.borrow();
        if signal.requested {
            Err(CancellationError::new(signal.reason.clone()))
        } else {
            Ok(())
        }
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|signal| signal.requested).await;
    }

    fn request(&self, reason: Option<String>) {
        self.tx.send_modify(|signal| {
            signal.requested = true;
            signal.reason = reason;
        });
        tracing::debug!(reason = ?self.cancellation_reason(), "cancellation requested");
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signal = self.tx.borrow();
        f.debug_struct("CancellationToken")
            .field("requested", &signal.requested)
            .field("reason", &signal.reason)
            .finish()
    }
}
