//! Single-slot refresh signal

use tokio::sync::mpsc::{self, error::TrySendError};

/// Requests a rebuild and restart of the served node
///
/// Cheap to clone. Requests never block; while one is pending further
/// requests are dropped.
#[derive(Debug, Clone)]
pub struct Refresher {
    tx: mpsc::Sender<()>,
}

impl Refresher {
    /// Request a refresh; `false` if one was already pending
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => false,
            Err(TrySendError::Closed(())) => {
                tracing::trace!("refresh requested after coordinator was dropped");
                false
            }
        }
    }
}

/// Receiving side, owned by the coordinator
#[derive(Debug)]
pub(crate) struct RefreshSlot {
    tx: mpsc::Sender<()>,
    rx: mpsc::Receiver<()>,
}

impl RefreshSlot {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self { tx, rx }
    }

    pub(crate) fn refresher(&self) -> Refresher {
        Refresher {
            tx: self.tx.clone(),
        }
    }

    /// Wait for the next request
    ///
    /// Never resolves to "closed" since the slot keeps a sender itself.
    pub(crate) async fn requested(&mut self) {
        let _ = self.rx.recv().await;
    }

    /// Drop a pending request; `true` if there was one
    pub(crate) fn drain(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
