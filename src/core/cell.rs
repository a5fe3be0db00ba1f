//! # StateCell: the conflated, multi-observer state slot.
//!
//! [`StateCell`] holds the latest published value and its revision. Producers
//! replace the value with [`StateCell::publish`]; consumers attach a
//! [`Cursor`] with [`StateCell::subscribe`] and pull values at their own pace.
//!
//! ## Architecture
//! ```text
//! producer 1 ──┐                        ┌──► Cursor A (last_seen = 41)
//! producer 2 ──┼── publish ──► Slot ────┼──► Cursor B (last_seen = 45)
//! producer N ──┘   (lock, O(1))  │      └──► Cursor C (waiting)
//!                                │
//!                     notify_waiters() after unlock
//! ```
//!
//! ## Rules
//! - `publish` never blocks on consumers and never queues: intermediate values
//!   are overwritten (conflation)
//! - value and revision are written and read under one lock, never torn
//! - waking cursors happens **after** the slot lock is released
//! - the previous value is dropped outside the lock
//! - after close, publishes are handed back as [`PublishError::Closed`]
//!
//! ## Example
//! ```rust
//! use stateflow::StateCell;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cell = StateCell::new(0u64);
//! let mut cursor = cell.subscribe();
//!
//! cell.publish(1).unwrap();
//! cell.publish(2).unwrap();
//!
//! // Conflated: the cursor only sees the latest value.
//! assert_eq!(cursor.next().await, Ok(2));
//!
//! cell.close();
//! assert!(cursor.next().await.is_err());
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;

use super::builder::StateCellBuilder;
use super::config::Config;
use super::cursor::Cursor;
use super::registry::{CursorId, Registry};
use super::slot::{Slot, Snapshot};
use crate::error::PublishError;
use crate::events::{Bus, Event, EventKind};

/// State shared by every handle and cursor of one cell.
pub(crate) struct Shared<T> {
    pub(crate) slot: Mutex<Slot<T>>,
    /// Woken on every accepted publish and on close.
    pub(crate) changed: Notify,
    pub(crate) registry: Registry,
    pub(crate) bus: Bus,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) cfg: Config,
    /// Cancelled when the shared state is dropped; stops the subscriber listener.
    pub(crate) runtime_token: CancellationToken,
}

impl<T> Shared<T> {
    pub(crate) fn new(seed: T, cfg: Config, name: Option<Arc<str>>, bus: Bus) -> Self {
        Self {
            slot: Mutex::new(Slot::new(seed)),
            changed: Notify::new(),
            registry: Registry::new(),
            bus,
            name,
            cfg,
            runtime_token: CancellationToken::new(),
        }
    }

    /// Publishes a lifecycle event, building it only if someone listens.
    #[inline]
    pub(crate) fn emit(&self, build: impl FnOnce() -> Event) {
        if self.bus.has_receivers() {
            self.bus.publish(build().with_cell_opt(self.name.as_ref()));
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}

/// Handle to a conflated state cell.
///
/// Cloning the handle is cheap and shares the same cell; there is no global
/// instance. The cell's state lives until the last handle and the last
/// cursor are dropped.
pub struct StateCell<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (revision, closed) = {
            let slot = self.shared.slot.lock();
            (slot.revision(), slot.is_closed())
        };
        f.debug_struct("StateCell")
            .field("name", &self.shared.name)
            .field("revision", &revision)
            .field("closed", &closed)
            .field("observers", &self.shared.registry.len())
            .finish()
    }
}

impl<T> StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an unnamed cell with default configuration and no subscribers.
    ///
    /// Does not need a running tokio runtime.
    pub fn new(seed: T) -> Self {
        StateCellBuilder::new(seed).build()
    }

    /// Starts building a cell with configuration, a name or event subscribers.
    pub fn builder(seed: T) -> StateCellBuilder<T> {
        StateCellBuilder::new(seed)
    }

    pub(crate) fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// Name given at build time, carried in every event.
    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    /// Configuration the cell was built with.
    pub fn config(&self) -> &Config {
        &self.shared.cfg
    }

    /// Replaces the value and returns its revision.
    ///
    /// Last writer wins between racing producers; each accepted call advances
    /// the revision by exactly one. Returns the value back as
    /// [`PublishError::Closed`] once the cell is closed.
    pub fn publish(&self, value: T) -> Result<u64, PublishError<T>> {
        let replaced = self.shared.slot.lock().replace(value);
        self.settle(replaced)
    }

    /// Publishes only if the cell is still at `expected` revision.
    ///
    /// Lets a producer build its update from a [`snapshot`](Self::snapshot)
    /// and detect that another producer got there first.
    pub fn compare_and_publish(&self, expected: u64, value: T) -> Result<u64, PublishError<T>> {
        let replaced = {
            let mut slot = self.shared.slot.lock();
            let actual = slot.revision();
            if actual != expected && !slot.is_closed() {
                return Err(PublishError::RevisionMismatch {
                    expected,
                    actual,
                    value,
                });
            }
            slot.replace(value)
        };
        self.settle(replaced)
    }

    /// Read-modify-write: publishes `update(&current)` in one critical section.
    ///
    /// `update` runs under the slot lock; keep it O(1) and never touch the
    /// same cell from inside it.
    pub fn publish_with<F>(&self, update: F) -> Result<u64, PublishError<()>>
    where
        F: FnOnce(&T) -> T,
    {
        let replaced = {
            let mut slot = self.shared.slot.lock();
            if slot.is_closed() {
                Err(PublishError::Closed(()))
            } else {
                let next = update(slot.value());
                slot.replace(next).map_err(|_| PublishError::Closed(()))
            }
        };
        self.settle(replaced)
    }

    /// Current value (cloned).
    pub fn get(&self) -> T {
        self.shared.slot.lock().value().clone()
    }

    /// Current revision (0 until the first publish).
    pub fn revision(&self) -> u64 {
        self.shared.slot.lock().revision()
    }

    /// Value and revision from the same instant.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.shared.slot.lock().snapshot()
    }

    /// Attaches a new observer cursor.
    ///
    /// The cursor's first [`next`](Cursor::next) returns the value current at
    /// attach time. On a closed cell it reports closure immediately instead.
    pub fn subscribe(&self) -> Cursor<T> {
        Cursor::attach(Arc::clone(&self.shared))
    }

    /// Number of cursors currently attached.
    pub fn observer_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Ids of cursors currently attached, in attach order.
    pub fn observers(&self) -> Vec<CursorId> {
        self.shared.registry.list()
    }

    /// Completes once at least `n` cursors are attached.
    pub async fn wait_for_observers(&self, n: usize) {
        self.shared.registry.wait_until(|count| count >= n).await;
    }

    /// Receiver for this cell's lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Finishes a publish outside the lock: drops the previous value, wakes
    /// cursors, reports rejections.
    fn settle<E>(&self, replaced: Result<(u64, T), PublishError<E>>) -> Result<u64, PublishError<E>> {
        match replaced {
            Ok((revision, previous)) => {
                drop(previous);
                self.shared.changed.notify_waiters();
                Ok(revision)
            }
            Err(e) => {
                if e.is_closed() {
                    let revision = self.revision();
                    self.shared
                        .emit(|| Event::new(EventKind::PublishRejected).with_revision(revision));
                }
                Err(e)
            }
        }
    }
}

impl<T> StateCell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Publishes `value` unless it equals the current value.
    ///
    /// Equal values are conflated entirely: no revision bump, no wakeup.
    /// Returns `Ok(None)` when skipped.
    pub fn publish_if_changed(&self, value: T) -> Result<Option<u64>, PublishError<T>> {
        let replaced = {
            let mut slot = self.shared.slot.lock();
            if !slot.is_closed() && *slot.value() == value {
                return Ok(None);
            }
            slot.replace(value)
        };
        self.settle(replaced).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn publish_advances_revision_by_one() {
        let cell = StateCell::new(0u64);
        assert_eq!(cell.revision(), 0);
        for i in 1..=100 {
            assert_eq!(cell.publish(i * 10), Ok(i));
        }
        assert_eq!(cell.snapshot(), Snapshot { value: 1000, revision: 100 });
    }

    #[test]
    fn concurrent_publishers_count_every_call() {
        let cell = StateCell::new((0usize, 0u64));
        let producers = 8;
        let per_producer = 5_000u64;

        thread::scope(|s| {
            for p in 0..producers {
                let cell = cell.clone();
                s.spawn(move || {
                    for i in 1..=per_producer {
                        cell.publish((p, i)).expect("open cell");
                    }
                });
            }
        });

        assert_eq!(cell.revision(), producers as u64 * per_producer);
        // Last writer wins: the final value is some producer's last publish.
        let (_, last) = cell.get();
        assert_eq!(last, per_producer);
    }

    #[test]
    fn snapshots_are_never_torn() {
        // Each value encodes the revision it is expected to land on when a
        // single producer publishes, so a torn pair would be detected.
        let cell = StateCell::new((0u64, 0u64));
        let stop = std::sync::atomic::AtomicBool::new(false);

        thread::scope(|s| {
            let reader = {
                let cell = cell.clone();
                let stop = &stop;
                s.spawn(move || {
                    let mut last = 0;
                    while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                        let snap = cell.snapshot();
                        assert_eq!(snap.value.0, snap.revision);
                        assert_eq!(snap.value.1, snap.revision * 3);
                        assert!(snap.revision >= last);
                        last = snap.revision;
                    }
                })
            };
            for i in 1..=20_000u64 {
                cell.publish((i, i * 3)).expect("open cell");
            }
            stop.store(true, std::sync::atomic::Ordering::Relaxed);
            reader.join().expect("reader");
        });
    }

    #[test]
    fn compare_and_publish_detects_lost_race() {
        let cell = StateCell::new("seed".to_string());
        let base = cell.revision();
        assert_eq!(cell.compare_and_publish(base, "first".into()), Ok(1));

        let err = cell
            .compare_and_publish(base, "stale".into())
            .expect_err("revision moved");
        assert_eq!(
            err,
            PublishError::RevisionMismatch {
                expected: 0,
                actual: 1,
                value: "stale".into()
            }
        );
        assert_eq!(cell.get(), "first");
    }

    #[test]
    fn publish_with_is_atomic_read_modify_write() {
        let cell = StateCell::new(0u64);
        thread::scope(|s| {
            for _ in 0..4 {
                let cell = cell.clone();
                s.spawn(move || {
                    for _ in 0..1_000 {
                        cell.publish_with(|v| v + 1).expect("open cell");
                    }
                });
            }
        });
        assert_eq!(cell.snapshot(), Snapshot { value: 4_000, revision: 4_000 });
    }

    #[test]
    fn equal_values_are_conflated() {
        let cell = StateCell::new(1);
        assert_eq!(cell.publish_if_changed(1), Ok(None));
        assert_eq!(cell.publish_if_changed(2), Ok(Some(1)));
        assert_eq!(cell.publish_if_changed(2), Ok(None));
        assert_eq!(cell.revision(), 1);
    }

    #[test]
    fn publish_after_close_hands_value_back() {
        let cell = StateCell::new(vec![1, 2]);
        cell.publish(vec![3]).expect("open cell");
        assert!(cell.close());

        assert_eq!(cell.publish(vec![9]), Err(PublishError::Closed(vec![9])));
        assert_eq!(cell.publish_with(|_| vec![10]), Err(PublishError::Closed(())));
        assert_eq!(cell.publish_if_changed(vec![11]), Err(PublishError::Closed(vec![11])));
        assert!(cell.compare_and_publish(1, vec![12]).expect_err("closed").is_closed());

        // Late readers still see the pre-close state, unchanged.
        assert_eq!(cell.snapshot(), Snapshot { value: vec![3], revision: 1 });
    }

    #[tokio::test]
    async fn rejected_publish_is_reported() {
        let cell = StateCell::builder(0u8).with_name("gauge").build();
        let mut events = cell.events();
        cell.close();
        assert!(cell.publish(1).is_err());

        let closed = events.recv().await.expect("close event");
        assert_eq!(closed.kind, EventKind::CellClosed);
        let rejected = events.recv().await.expect("reject event");
        assert_eq!(rejected.kind, EventKind::PublishRejected);
        assert_eq!(rejected.cell.as_deref(), Some("gauge"));
        assert_eq!(rejected.revision, Some(0));
    }

    #[test]
    fn debug_does_not_need_debug_values() {
        struct Opaque;
        impl Clone for Opaque {
            fn clone(&self) -> Self {
                Opaque
            }
        }
        let cell = StateCell::builder(Opaque).with_name("opaque").build();
        let s = format!("{cell:?}");
        assert!(s.contains("opaque") && s.contains("revision: 0"), "{s}");
    }
}
