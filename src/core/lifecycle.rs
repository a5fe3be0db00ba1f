//! # Lifecycle: close, drain and shutdown of a cell.
//!
//! Closing is the only terminal transition a cell has. It is idempotent, safe
//! against in-flight publishes, and wakes every waiting cursor so none of them
//! hangs.
//!
//! ## Shutdown path
//! ```text
//! shutdown()
//!   └─► close()                     → Bus.publish(CellClosed)      (first call only)
//!          └─► changed.notify_waiters()  → every waiting cursor re-inspects the slot
//!   └─► wait (≤ grace) until registry is empty:
//!          ├─ Ok        → Bus.publish(AllDetachedWithin)
//!          └─ timed out → Bus.publish(GraceExceeded), Err(RuntimeError::GraceExceeded)
//! ```
//!
//! ## Rules
//! - close takes the slot lock, so it orders cleanly against concurrent publishes
//!   and attaches; `CellClosed` is published under that lock
//! - cursors attached after close observe termination on their first read
//! - shutdown never forces cursors off: they detach when their consumers drop them

use std::time::Duration;

use super::cell::StateCell;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind};

impl<T> StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Closes the cell and wakes every waiting cursor.
    ///
    /// Returns `true` for the call that closed the cell, `false` for every
    /// later call.
    pub fn close(&self) -> bool {
        {
            let mut slot = self.shared.slot.lock();
            if !slot.close() {
                return false;
            }
            // Under the slot lock: ordered against ObserverAttached events.
            let (revision, observers) = (slot.revision(), self.shared.registry.len());
            self.shared.emit(|| {
                Event::new(EventKind::CellClosed)
                    .with_revision(revision)
                    .with_observers(observers)
            });
        }
        self.shared.changed.notify_waiters();
        true
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.slot.lock().is_closed()
    }

    /// Completes once the cell is closed.
    pub async fn closed(&self) {
        loop {
            let notified = self.shared.changed.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    /// Completes once no cursor is attached.
    pub async fn observers_drained(&self) {
        self.shared.registry.wait_until(|count| count == 0).await;
    }

    /// Closes the cell and waits up to the configured grace period for every
    /// cursor to detach.
    ///
    /// With `grace = 0` the cell is closed and no waiting happens.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        match self.shared.cfg.grace_period() {
            Some(grace) => self.shutdown_within(grace).await,
            None => {
                self.close();
                Ok(())
            }
        }
    }

    /// Closes the cell and waits up to `grace` for every cursor to detach.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] with the ids of the cursors
    /// still attached when the grace period ran out.
    pub async fn shutdown_within(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.close();

        match tokio::time::timeout(grace, self.observers_drained()).await {
            Ok(()) => {
                self.shared
                    .emit(|| Event::new(EventKind::AllDetachedWithin).with_timeout(grace));
                Ok(())
            }
            Err(_elapsed) => {
                let stuck = self.observers();
                let registry = &self.shared.registry;
                self.shared.emit(|| {
                    let detail: Vec<String> = stuck
                        .iter()
                        .map(|id| match registry.attached_at(*id) {
                            Some(rev) => format!("{id}@{rev}"),
                            None => id.to_string(),
                        })
                        .collect();
                    Event::new(EventKind::GraceExceeded)
                        .with_timeout(grace)
                        .with_observers(stuck.len())
                        .with_reason(format!("attached={}", detail.join(",")))
                });
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}
