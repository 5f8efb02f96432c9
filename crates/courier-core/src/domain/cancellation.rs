//! Cancellation - a watch channel carrying a single "cancelled" flag.
//!
//! The source side flips the flag; every signal clone observes it. Signals
//! are passed to every pipeline stage as an explicit parameter.

use std::future::Future;

use tokio::sync::watch;

/// Owner side. Dropping it without cancelling leaves signals pending forever.
#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: Some(self.tx.subscribe()),
        }
    }

    pub fn cancel(&self) {
        // send_replace works even when no receiver is alive yet
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancellationSignal {
    /// A signal that never fires.
    pub fn none() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.clone().cancelled_owned().await
    }

    /// Owned variant of [`cancelled`](Self::cancelled), usable where a
    /// `'static` future is required.
    pub fn cancelled_owned(self) -> impl Future<Output = ()> + Send + 'static {
        async move {
            let Some(mut rx) = self.rx else {
                return std::future::pending().await;
            };
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if closed {
                // source dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}
