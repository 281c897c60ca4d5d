//! Serve lifecycle events

use tokio::sync::mpsc::UnboundedSender;

/// Observable transitions of a serve session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeEvent {
    /// Code generation started
    Generating,
    /// Code generation finished
    Generated,
    /// Node binary is being compiled
    Building,
    /// Node process started
    Started {
        /// OS process id
        pid: Option<u32>,
    },
    /// A change was observed; the node is being stopped for a rebuild
    Restarting,
    /// The node exited without being asked to
    Exited {
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
    },
    /// The session ended
    Stopped,
}

/// Optional event destination; sends never block or fail
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink(Option<UnboundedSender<ServeEvent>>);

impl EventSink {
    pub(crate) fn new(tx: Option<UnboundedSender<ServeEvent>>) -> Self {
        Self(tx)
    }

    pub(crate) fn emit(&self, event: ServeEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}
