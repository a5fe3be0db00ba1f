//! # Lifecycle events emitted by state cells and their cursors.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Observer events**: cursors attaching, detaching, being cancelled or terminated
//! - **Lifecycle events**: close, rejected publishes, drain results
//! - **Subscriber events**: overflow and panics inside the subscriber fan-out
//!
//! The [`Event`] struct carries additional metadata such as timestamps, cell name,
//! cursor id, revision and observer count.
//!
//! Publishing a value does **not** emit an event: the publish path stays
//! allocation-free and independent of how many subscribers are listening.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use stateflow::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CellClosed)
//!     .with_cell("prices")
//!     .with_revision(42)
//!     .with_observers(3);
//!
//! assert_eq!(ev.kind, EventKind::CellClosed);
//! assert_eq!(ev.cell.as_deref(), Some("prices"));
//! assert_eq!(ev.revision, Some(42));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::CursorId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Observer events ===
    /// A cursor was attached to the cell.
    ///
    /// Sets:
    /// - `cursor`: id of the new cursor
    /// - `revision`: cell revision at attach time
    /// - `observers`: attached count after the attach
    ObserverAttached,

    /// A cursor was detached (explicitly or by drop).
    ///
    /// Sets:
    /// - `cursor`: id of the cursor
    /// - `revision`: last revision the cursor consumed (if any)
    /// - `observers`: attached count after the detach
    ObserverDetached,

    /// A cursor's wait was cancelled by its consumer's token.
    ///
    /// Always followed by `ObserverDetached` for the same cursor.
    ///
    /// Sets:
    /// - `cursor`: id of the cursor
    ObserverCancelled,

    /// A cursor observed the close signal.
    ///
    /// Sets:
    /// - `cursor`: id of the cursor
    /// - `revision`: final revision of the cell
    ObserverTerminated,

    // === Lifecycle events ===
    /// The cell was closed (emitted once).
    ///
    /// Sets:
    /// - `revision`: final revision
    /// - `observers`: cursors attached at close time
    CellClosed,

    /// A publish arrived after close and was handed back to the producer.
    ///
    /// Sets:
    /// - `revision`: final revision (unchanged by the rejected publish)
    PublishRejected,

    /// Every cursor detached within the shutdown grace period.
    ///
    /// Sets:
    /// - `timeout_ms`: configured grace (ms)
    AllDetachedWithin,

    /// Grace period exceeded; some cursors were still attached.
    ///
    /// Sets:
    /// - `timeout_ms`: configured grace (ms)
    /// - `observers`: cursors still attached
    /// - `reason`: ids of the cursors still attached
    GraceExceeded,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and reason ("full", "closed")
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the cell, if it was given one.
    pub cell: Option<Arc<str>>,
    /// Cursor the event is about.
    pub cursor: Option<CursorId>,
    /// Cell revision relevant to the event.
    pub revision: Option<u64>,
    /// Number of attached cursors relevant to the event.
    pub observers: Option<usize>,
    /// Grace or wait duration in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (overflow details, panic info, stuck cursors).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            cell: None,
            cursor: None,
            revision: None,
            observers: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches the cell name.
    #[inline]
    pub fn with_cell(mut self, cell: impl Into<Arc<str>>) -> Self {
        self.cell = Some(cell.into());
        self
    }

    /// Attaches the cell name if there is one.
    #[inline]
    pub(crate) fn with_cell_opt(mut self, cell: Option<&Arc<str>>) -> Self {
        self.cell = cell.cloned();
        self
    }

    /// Attaches a cursor id.
    #[inline]
    pub fn with_cursor(mut self, id: CursorId) -> Self {
        self.cursor = Some(id);
        self
    }

    /// Attaches a revision.
    #[inline]
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Attaches an observer count.
    #[inline]
    pub fn with_observers(mut self, n: usize) -> Self {
        self.observers = Some(n);
        self
    }

    /// Attaches a duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::CellClosed);
        let b = Event::new(EventKind::CellClosed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn timeout_saturates_at_u32() {
        let ev = Event::new(EventKind::GraceExceeded).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn overflow_event_names_subscriber() {
        let ev = Event::subscriber_overflow("metrics", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.reason.as_deref(), Some("subscriber=metrics reason=full"));
    }
}
