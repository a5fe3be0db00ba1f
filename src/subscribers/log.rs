//! # LogWriter: lifecycle events as `tracing` records
//!
//! A minimal subscriber that writes incoming [`Event`]s through `tracing`.
//! Install any `tracing` subscriber (e.g. `tracing-subscriber`'s fmt layer)
//! to see them.
//!
//! ## Example output
//! ```text
//! DEBUG stateflow: observer attached cell=Some("prices") cursor=Some(CursorId(3)) revision=Some(41) observers=Some(2)
//! INFO  stateflow: cell closed cell=Some("prices") revision=Some(97) observers=Some(2)
//! WARN  stateflow: grace exceeded cell=Some("prices") grace_ms=Some(10000) reason=Some("attached=#3@41")
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ObserverAttached => {
                tracing::debug!(cell = ?e.cell, cursor = ?e.cursor, revision = ?e.revision, observers = ?e.observers, "observer attached");
            }
            EventKind::ObserverDetached => {
                tracing::debug!(cell = ?e.cell, cursor = ?e.cursor, revision = ?e.revision, observers = ?e.observers, "observer detached");
            }
            EventKind::ObserverCancelled => {
                tracing::debug!(cell = ?e.cell, cursor = ?e.cursor, "observer cancelled");
            }
            EventKind::ObserverTerminated => {
                tracing::debug!(cell = ?e.cell, cursor = ?e.cursor, revision = ?e.revision, "observer terminated");
            }
            EventKind::CellClosed => {
                tracing::info!(cell = ?e.cell, revision = ?e.revision, observers = ?e.observers, "cell closed");
            }
            EventKind::AllDetachedWithin => {
                tracing::info!(cell = ?e.cell, grace_ms = ?e.timeout_ms, "all observers detached within grace");
            }
            EventKind::PublishRejected => {
                tracing::warn!(cell = ?e.cell, revision = ?e.revision, "publish after close rejected");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(cell = ?e.cell, grace_ms = ?e.timeout_ms, reason = ?e.reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(reason = ?e.reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(reason = ?e.reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
