//! # Observer cursor: one consumer's view of a cell.
//!
//! A [`Cursor`] remembers the last revision its consumer consumed and pulls
//! the next one on demand. Values published in between are skipped, never
//! queued.
//!
//! ## States
//! ```text
//! Attached ──► Waiting ──► Delivering ──┬──► Waiting     (next call, nothing new)
//!    │            │                     ├──► Detached    (detach / drop / cancel)
//!    │            │                     └──► Terminated  (cell closed, final value seen)
//!    └────────────┴──► Delivering       (something new already available)
//! ```
//!
//! ## Rules
//! - The first observation is the value current at attach time
//! - Later observations require a revision different from the last consumed one
//! - The last value published before close is delivered before termination
//! - The waiter is registered **before** the slot is inspected, so a publish
//!   racing with the inspection always wakes the cursor
//! - Dropping a pending `next()` future loses nothing; the cursor stays attached
//! - Detach (explicit, drop or cancellation) releases the registry entry exactly once

use std::fmt;
use std::sync::Arc;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use super::cell::Shared;
use super::registry::CursorId;
use super::slot::Observation;
use crate::error::ObserveError;
use crate::events::{Event, EventKind};

/// Where a cursor is in its observe protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Attached, nothing consumed yet.
    Attached,
    /// Suspended in `next()` until the revision changes or the cell closes.
    ///
    /// An abandoned wait (dropped `next()` future) restores the previous state.
    Waiting,
    /// Handed a value to the consumer.
    Delivering,
    /// Released by its consumer (cancellation); no further values.
    Detached,
    /// Observed the close signal; no further values.
    Terminated,
}

impl CursorState {
    /// True once the cursor will never yield another value.
    #[inline]
    pub fn is_final(self) -> bool {
        matches!(self, CursorState::Detached | CursorState::Terminated)
    }
}

/// Per-consumer cursor over a [`StateCell`](crate::StateCell).
///
/// Owned by exactly one consumer: the API takes `&mut self` and the cursor is
/// not `Clone`. Attach another cursor for another consumer.
pub struct Cursor<T> {
    shared: Arc<Shared<T>>,
    id: CursorId,
    last_seen: Option<u64>,
    state: CursorState,
    registered: bool,
}

impl<T> Cursor<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn attach(shared: Arc<Shared<T>>) -> Self {
        // Registered and announced under the slot lock, so both the
        // "attached after close" decision and the ObserverAttached event are
        // ordered against close and its CellClosed event.
        let (id, revision, closed) = {
            let slot = shared.slot.lock();
            let revision = slot.revision();
            let (id, observers) = shared.registry.attach(revision);
            shared.emit(|| {
                Event::new(EventKind::ObserverAttached)
                    .with_cursor(id)
                    .with_revision(revision)
                    .with_observers(observers)
            });
            (id, revision, slot.is_closed())
        };

        Self {
            shared,
            id,
            // A cursor attached after close has nothing left to see.
            last_seen: closed.then_some(revision),
            state: CursorState::Attached,
            registered: true,
        }
    }

    /// Identity of this cursor in the cell's registry.
    pub fn id(&self) -> CursorId {
        self.id
    }

    /// Revision of the last value handed to the consumer.
    pub fn last_seen_revision(&self) -> Option<u64> {
        self.last_seen
    }

    /// Current protocol state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// True if [`next`](Self::next) would return without suspending.
    pub fn has_changed(&self) -> bool {
        if self.state.is_final() {
            return true;
        }
        let slot = self.shared.slot.lock();
        self.last_seen != Some(slot.revision()) || slot.is_closed()
    }

    /// Waits for a revision this cursor has not consumed and returns its value.
    ///
    /// Returns [`ObserveError::Closed`] once the cell is closed and the final
    /// value has been delivered, and keeps returning it afterwards.
    ///
    /// Cancel-safe: dropping the returned future loses no value.
    pub async fn next(&mut self) -> Result<T, ObserveError> {
        if let Some(err) = self.final_error() {
            return Err(err);
        }
        let shared = Arc::clone(&self.shared);
        loop {
            let notified = shared.changed.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.try_observe() {
                return outcome;
            }
            let _waiting = WaitingGuard::enter(&mut self.state);
            notified.await;
        }
    }

    /// Like [`next`](Self::next), but gives up when `token` is cancelled.
    ///
    /// Cancellation detaches the cursor (its registry entry is released) and
    /// returns [`ObserveError::Cancelled`]; every later call returns the same.
    pub async fn next_or_cancel(&mut self, token: &CancellationToken) -> Result<T, ObserveError> {
        if let Some(err) = self.final_error() {
            return Err(err);
        }
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            res = self.next() => Some(res),
        };
        match outcome {
            Some(res) => res,
            None => {
                self.cancel();
                Err(ObserveError::Cancelled)
            }
        }
    }

    /// Blocking variant of [`next`](Self::next) for consumers on plain threads.
    ///
    /// Parks the calling thread; do not call it from inside an async task.
    pub fn blocking_next(&mut self) -> Result<T, ObserveError> {
        futures::executor::block_on(self.next())
    }

    /// Turns the cursor into a lazy stream of values that ends when the cell closes.
    ///
    /// The stream is not replayable: it starts from the value current when
    /// first polled (or the cursor's position) and skips conflated values.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send + 'static {
        futures::stream::unfold(self, |mut cursor| async move {
            match cursor.next().await {
                Ok(value) => Some((value, cursor)),
                Err(_) => None,
            }
        })
    }

    /// Detaches the cursor now.
    ///
    /// Same as dropping it; provided for call sites where an explicit detach reads better.
    pub fn detach(self) {
        drop(self);
    }

    fn final_error(&self) -> Option<ObserveError> {
        match self.state {
            CursorState::Terminated => Some(ObserveError::Closed),
            CursorState::Detached => Some(ObserveError::Cancelled),
            _ => None,
        }
    }

    /// Inspects the slot once. `None` means nothing new: keep waiting.
    fn try_observe(&mut self) -> Option<Result<T, ObserveError>> {
        let observed = self.shared.slot.lock().observe(self.last_seen);
        match observed {
            Observation::Value(snap) => {
                self.last_seen = Some(snap.revision);
                self.state = CursorState::Delivering;
                Some(Ok(snap.value))
            }
            Observation::Closed(revision) => {
                self.last_seen = Some(revision);
                self.state = CursorState::Terminated;
                let id = self.id;
                self.shared.emit(|| {
                    Event::new(EventKind::ObserverTerminated)
                        .with_cursor(id)
                        .with_revision(revision)
                });
                Some(Err(ObserveError::Closed))
            }
            Observation::Unchanged => None,
        }
    }

    fn cancel(&mut self) {
        self.state = CursorState::Detached;
        let id = self.id;
        self.shared
            .emit(|| Event::new(EventKind::ObserverCancelled).with_cursor(id));
        self.release();
    }
}

impl<T> Cursor<T> {
    /// Removes the registry entry (once).
    fn release(&mut self) {
        if !std::mem::replace(&mut self.registered, false) {
            return;
        }
        if let Some(remaining) = self.shared.registry.detach(self.id) {
            let (id, last_seen) = (self.id, self.last_seen);
            self.shared.emit(|| {
                let ev = Event::new(EventKind::ObserverDetached)
                    .with_cursor(id)
                    .with_observers(remaining);
                match last_seen {
                    Some(rev) => ev.with_revision(rev),
                    None => ev,
                }
            });
        }
    }
}

/// Marks a cursor `Waiting` while suspended and restores the previous state
/// when the wait ends, including when the `next()` future is dropped.
struct WaitingGuard<'a> {
    state: &'a mut CursorState,
    resume: CursorState,
}

impl<'a> WaitingGuard<'a> {
    fn enter(state: &'a mut CursorState) -> Self {
        let resume = std::mem::replace(state, CursorState::Waiting);
        Self { state, resume }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        *self.state = self.resume;
    }
}

impl<T> Drop for Cursor<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("last_seen", &self.last_seen)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::time::timeout;

    use super::*;
    use crate::StateCell;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn first_observation_is_value_at_attach() {
        let cell = StateCell::new(0u32);
        cell.publish(7).unwrap();

        let mut cursor = cell.subscribe();
        assert_eq!(cursor.state(), CursorState::Attached);
        assert!(cursor.has_changed());
        assert_eq!(cursor.next().await, Ok(7));
        assert_eq!(cursor.last_seen_revision(), Some(1));
        assert_eq!(cursor.state(), CursorState::Delivering);
        assert!(!cursor.has_changed());
    }

    #[tokio::test]
    async fn intermediate_values_are_conflated() {
        let cell = StateCell::new(0u32);
        let mut cursor = cell.subscribe();
        assert_eq!(cursor.next().await, Ok(0));

        for v in 1..=50 {
            cell.publish(v).unwrap();
        }
        assert_eq!(cursor.next().await, Ok(50));
        assert_eq!(cursor.last_seen_revision(), Some(50));
    }

    #[tokio::test]
    async fn waiting_cursor_wakes_on_publish() {
        let cell = StateCell::new(0u32);
        let mut cursor = cell.subscribe();
        assert_eq!(cursor.next().await, Ok(0));

        let reader = tokio::spawn(async move {
            let v = cursor.next().await;
            (v, cursor.state())
        });
        tokio::task::yield_now().await;
        cell.publish(1).unwrap();

        let (v, state) = timeout(WAIT, reader).await.expect("woke").expect("joined");
        assert_eq!(v, Ok(1));
        assert_eq!(state, CursorState::Delivering);
    }

    #[tokio::test]
    async fn final_value_then_terminal_signal() {
        let cell = StateCell::new(0u32);
        let mut cursor = cell.subscribe();
        cell.publish(3).unwrap();
        cell.close();

        assert_eq!(cursor.next().await, Ok(3));
        assert_eq!(cursor.next().await, Err(ObserveError::Closed));
        assert_eq!(cursor.state(), CursorState::Terminated);
        // Terminal is sticky.
        assert_eq!(cursor.next().await, Err(ObserveError::Closed));
    }

    #[tokio::test]
    async fn cursor_attached_after_close_terminates_immediately() {
        let cell = StateCell::new(1u32);
        cell.close();

        let mut cursor = cell.subscribe();
        assert_eq!(
            timeout(WAIT, cursor.next()).await.expect("no hang"),
            Err(ObserveError::Closed)
        );
    }

    #[tokio::test]
    async fn cancellation_detaches_cursor() {
        let cell = StateCell::new(0u32);
        let mut cursor = cell.subscribe();
        assert_eq!(cursor.next().await, Ok(0));
        assert_eq!(cell.observer_count(), 1);

        let token = CancellationToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move {
                let res = cursor.next_or_cancel(&token).await;
                (res, cursor)
            })
        };
        tokio::task::yield_now().await;
        token.cancel();

        let (res, mut cursor) = timeout(WAIT, waiter).await.expect("unwound").expect("joined");
        assert_eq!(res, Err(ObserveError::Cancelled));
        assert_eq!(cursor.state(), CursorState::Detached);
        assert_eq!(cell.observer_count(), 0);

        // Detached cursors stay detached, even if new values arrive.
        cell.publish(1).unwrap();
        assert_eq!(cursor.next().await, Err(ObserveError::Cancelled));
        drop(cursor);
        assert_eq!(cell.observer_count(), 0);
    }

    #[tokio::test]
    async fn dropped_next_future_keeps_cursor_usable() {
        let cell = StateCell::new(0u32);
        let mut cursor = cell.subscribe();
        assert_eq!(cursor.next().await, Ok(0));

        // Time out a pending wait, then make sure the cursor still works.
        assert!(timeout(Duration::from_millis(10), cursor.next()).await.is_err());
        assert_eq!(cell.observer_count(), 1);
        assert_eq!(cursor.state(), CursorState::Delivering);
        assert!(!cursor.has_changed());

        cell.publish(2).unwrap();
        assert_eq!(cursor.next().await, Ok(2));
    }

    #[tokio::test]
    async fn abandoned_wait_restores_state() {
        let cell = StateCell::new(0u32);
        let mut cursor = cell.subscribe();
        assert_eq!(cursor.next().await, Ok(0));
        {
            let pending = cursor.next();
            let mut pending = std::pin::pin!(pending);
            assert!(futures::poll!(pending.as_mut()).is_pending());
        }
        assert_eq!(cursor.state(), CursorState::Delivering);
    }

    #[test]
    fn attach_events_are_ordered_against_close() {
        use std::collections::HashSet;

        let cell = StateCell::builder(0u32)
            .with_config(crate::Config {
                bus_capacity: 8192,
                ..crate::Config::default()
            })
            .build();
        let mut events = cell.events();
        let outcomes = parking_lot::Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        let mut cursor = cell.subscribe();
                        let got_value = cursor.blocking_next().is_ok();
                        outcomes.lock().push((cursor.id(), got_value));
                    }
                });
            }
            s.spawn(|| {
                std::thread::sleep(Duration::from_millis(1));
                cell.close();
            });
        });

        let mut closed = false;
        let mut attached_open = HashSet::new();
        while let Ok(ev) = events.try_recv() {
            match ev.kind {
                EventKind::CellClosed => closed = true,
                EventKind::ObserverAttached if !closed => {
                    attached_open.insert(ev.cursor.expect("cursor id"));
                }
                _ => {}
            }
        }
        assert!(closed);

        // A cursor got a value exactly when its attach event precedes CellClosed.
        let outcomes = outcomes.into_inner();
        assert_eq!(outcomes.len(), 800);
        for (id, got_value) in outcomes {
            assert_eq!(got_value, attached_open.contains(&id), "cursor {id}");
        }
    }

    #[tokio::test]
    async fn stream_ends_on_close() {
        let cell = StateCell::new(0u64);
        let stream = cell.subscribe().into_stream();
        cell.publish(1).unwrap();
        cell.close();

        let seen: Vec<u64> = timeout(WAIT, stream.collect()).await.expect("stream ended");
        assert_eq!(seen, vec![1]);
        assert_eq!(cell.observer_count(), 0);
    }

    #[test]
    fn blocking_cursor_on_plain_thread() {
        let cell = StateCell::new(0u64);
        let mut cursor = cell.subscribe();

        let consumer = std::thread::spawn(move || {
            let mut last = 0;
            while let Ok(v) = cursor.blocking_next() {
                assert!(v >= last, "regressed from {last} to {v}");
                last = v;
            }
            last
        });

        for v in 1..=10_000u64 {
            cell.publish(v).unwrap();
        }
        cell.close();
        assert_eq!(consumer.join().expect("consumer"), 10_000);
    }

    #[tokio::test]
    async fn detach_events_are_published() {
        let cell = StateCell::new(0u8);
        let mut events = cell.events();

        let cursor = cell.subscribe();
        let id = cursor.id();
        cursor.detach();

        let attached = events.recv().await.unwrap();
        assert_eq!(attached.kind, EventKind::ObserverAttached);
        assert_eq!(attached.cursor, Some(id));
        assert_eq!(attached.observers, Some(1));

        let detached = events.recv().await.unwrap();
        assert_eq!(detached.kind, EventKind::ObserverDetached);
        assert_eq!(detached.cursor, Some(id));
        assert_eq!(detached.observers, Some(0));
        assert_eq!(detached.revision, None);
    }
}
