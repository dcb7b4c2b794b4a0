use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::{TryRecvError, TrySendError}};
use tokio::sync::Notify;
use tracing::warn;

use super::registry::ConnectionId;

#[derive(Debug, Default)]
struct Overflow {
    flagged: AtomicBool,
    notify: Notify,
}

/// Outbound frame queue of a single connection. Drained by the socket writer task.
///
/// A queue that fills up marks its connection as a slow consumer; the writer
/// then closes the connection instead of letting it miss membership frames.
#[derive(Clone, Debug)]
pub struct Outbox {
    frames: mpsc::Sender<String>,
    overflow: Arc<Overflow>,
}

pub struct OutboxReceiver {
    frames: mpsc::Receiver<String>,
    overflow: Arc<Overflow>,
}

impl Outbox {
    pub fn channel(capacity: usize) -> (Outbox, OutboxReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let overflow = Arc::new(Overflow::default());
        (
            Outbox { frames: tx, overflow: overflow.clone() },
            OutboxReceiver { frames: rx, overflow },
        )
    }

    /// Queue a frame without waiting. Returns false if it was not queued.
    pub fn push(&self, connection_id: ConnectionId, frame: String) -> bool {
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbox of connection {} is full, closing slow consumer", connection_id);
                self.overflow.flagged.store(true, Ordering::SeqCst);
                self.overflow.notify.notify_waiters();
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Outbox of connection {} is closed, frame dropped", connection_id);
                false
            }
        }
    }
}

impl OutboxReceiver {
    pub async fn recv(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    pub fn try_recv(&mut self) -> Result<String, TryRecvError> {
        self.frames.try_recv()
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflow.flagged.load(Ordering::SeqCst)
    }

    /// Handle for waiting on overflow while the frames are being received.
    pub fn overflow_signal(&self) -> OverflowSignal {
        OverflowSignal(self.overflow.clone())
    }
}

pub struct OverflowSignal(Arc<Overflow>);

impl OverflowSignal {
    /// Resolves once a frame has been refused because the queue was full.
    pub async fn triggered(&self) {
        loop {
            let notified = self.0.notify.notified();
            if self.0.flagged.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}
