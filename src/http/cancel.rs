use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Tracks the one send that is allowed to be in flight.
///
/// Starting a new send signals cancellation to the previous one.
pub struct InFlight {
    current: Mutex<Option<(u64, broadcast::Sender<()>)>>,
    next_ticket: AtomicU64,
}

impl InFlight {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<(u64, broadcast::Sender<()>)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new send, canceling whatever was outstanding.
    pub fn begin(&self) -> (u64, broadcast::Receiver<()>) {
        let (tx, rx) = broadcast::channel(1);
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        if let Some((previous, previous_tx)) = self.slot().replace((ticket, tx)) {
            tracing::debug!(ticket = previous, "superseding in-flight send");
            let _ = previous_tx.send(());
        }

        (ticket, rx)
    }

    /// Cancel the outstanding send, if any.
    pub fn cancel(&self) -> bool {
        if let Some((ticket, tx)) = self.slot().take() {
            tracing::debug!(ticket, "cancelling in-flight send");
            let _ = tx.send(());
            return true;
        }
        false
    }

    /// Release the slot once `ticket` has completed. Returns `false` when the
    /// ticket was canceled or superseded in the meantime; a newer send is left
    /// alone.
    pub fn finish(&self, ticket: u64) -> bool {
        let mut slot = self.slot();
        if matches!(slot.as_ref(), Some((current, _)) if *current == ticket) {
            slot.take();
            return true;
        }
        false
    }

    pub fn is_busy(&self) -> bool {
        self.slot().is_some()
    }
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}
