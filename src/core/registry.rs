//! # Registry of attached observer cursors.
//!
//! The registry answers one question: which cursors are attached right now?
//! It is used for diagnostics and shutdown fencing only; publishers never
//! consult it (state is conflated, not routed per subscriber).
//!
//! ## Architecture
//! ```text
//! StateCell::subscribe() ──► Registry::attach()  ──► CursorId
//! Cursor::detach() / drop ──► Registry::detach() ──► remaining count
//! StateCell::shutdown()   ──► Registry::wait_until(|n| n == 0)
//! ```
//!
//! ## Rules
//! - Registry holds ids and metadata, never the cursor itself
//! - `detach` is idempotent (second call returns `None`)
//! - Every attach/detach wakes `wait_until` callers

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Opaque identity of an observer cursor.
///
/// Ids are unique per cell and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CursorId(u64);

impl CursorId {
    #[inline]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the numeric id.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry metadata for one attached cursor.
#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Cell revision at attach time.
    attached_at: u64,
}

/// Thread-safe set of attached cursors.
pub(crate) struct Registry {
    entries: Mutex<HashMap<CursorId, Entry>>,
    next_id: AtomicU64,
    changed: Notify,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            changed: Notify::new(),
        }
    }

    /// Registers a new cursor and returns its id plus the attached count.
    pub(crate) fn attach(&self, revision: u64) -> (CursorId, usize) {
        let id = CursorId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut entries = self.entries.lock();
            entries.insert(id, Entry { attached_at: revision });
            entries.len()
        };
        self.changed.notify_waiters();
        (id, count)
    }

    /// Removes a cursor. Returns the remaining count, or `None` if it was
    /// not attached.
    pub(crate) fn detach(&self, id: CursorId) -> Option<usize> {
        let remaining = {
            let mut entries = self.entries.lock();
            entries.remove(&id)?;
            entries.len()
        };
        self.changed.notify_waiters();
        Some(remaining)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns attached cursor ids in attach order.
    pub(crate) fn list(&self) -> Vec<CursorId> {
        let mut ids: Vec<CursorId> = self.entries.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Revision the cursor attached at, if it is still attached.
    pub(crate) fn attached_at(&self, id: CursorId) -> Option<u64> {
        self.entries.lock().get(&id).map(|e| e.attached_at)
    }

    /// Completes once `pred(attached_count)` holds.
    pub(crate) async fn wait_until(&self, pred: impl Fn(usize) -> bool) {
        loop {
            let notified = self.changed.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();

            if pred(self.len()) {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn attach_detach_bookkeeping() {
        let reg = Registry::new();
        let (a, n) = reg.attach(0);
        assert_eq!(n, 1);
        let (b, n) = reg.attach(7);
        assert_eq!(n, 2);
        assert!(a < b);
        assert_eq!(reg.list(), vec![a, b]);
        assert_eq!(reg.attached_at(b), Some(7));

        assert_eq!(reg.detach(a), Some(1));
        assert_eq!(reg.detach(a), None);
        assert_eq!(reg.list(), vec![b]);
        assert_eq!(reg.attached_at(a), None);

        // Ids come from one counter starting at 1 and are never reused.
        let (c, _) = reg.attach(9);
        assert_eq!((a.as_u64(), b.as_u64(), c.as_u64()), (1, 2, 3));
    }

    #[test]
    fn display_is_short() {
        assert_eq!(CursorId::from_raw(12).to_string(), "#12");
        assert_eq!(CursorId::from_raw(12).as_u64(), 12);
    }

    #[tokio::test]
    async fn wait_until_wakes_on_detach() {
        let reg = Arc::new(Registry::new());
        let (id, _) = reg.attach(0);

        let waiter = {
            let reg = Arc::clone(&reg);
            tokio::spawn(async move { reg.wait_until(|n| n == 0).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        reg.detach(id);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .expect("waiter did not panic");
    }
}
