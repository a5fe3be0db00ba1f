//! # The single shared slot: value, revision and close flag.
//!
//! All three fields live behind one lock in [`StateCell`](crate::StateCell), so
//! every reader sees a `(value, revision)` pair written by exactly one publish.
//!
//! ## Rules
//! - `revision` starts at 0 (the seed) and grows by exactly 1 per accepted publish
//! - `revision` wraps instead of overflowing; cursors compare for inequality
//! - once `closed` is set, no publish touches `value` or `revision` again

use crate::error::PublishError;

/// A value together with the revision it was published at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// The published value.
    pub value: T,
    /// Revision of `value` (0 = seed).
    pub revision: u64,
}

/// What a cursor finds when it inspects the slot.
pub(crate) enum Observation<T> {
    /// A revision the cursor has not consumed yet.
    Value(Snapshot<T>),
    /// Closed, and the cursor already holds the final revision.
    Closed(u64),
    /// Nothing new; the cursor has to wait.
    Unchanged,
}

pub(crate) struct Slot<T> {
    value: T,
    revision: u64,
    closed: bool,
}

impl<T> Slot<T> {
    pub(crate) fn new(seed: T) -> Self {
        Self {
            value: seed,
            revision: 0,
            closed: false,
        }
    }

    #[inline]
    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    pub(crate) fn value(&self) -> &T {
        &self.value
    }

    /// Stores `value` under the next revision.
    ///
    /// Returns the new revision and the previous value; the caller drops the
    /// previous value after releasing the lock.
    pub(crate) fn replace(&mut self, value: T) -> Result<(u64, T), PublishError<T>> {
        if self.closed {
            return Err(PublishError::Closed(value));
        }
        let previous = std::mem::replace(&mut self.value, value);
        self.revision = self.revision.wrapping_add(1);
        Ok((self.revision, previous))
    }

    /// Sets the close flag. Returns `true` only on the first call.
    pub(crate) fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }
}

impl<T: Clone> Slot<T> {
    /// Compares the slot against a cursor's last consumed revision.
    ///
    /// An unconsumed revision wins over the close flag, so the last value
    /// published before close is still delivered once.
    pub(crate) fn observe(&self, last_seen: Option<u64>) -> Observation<T> {
        if last_seen != Some(self.revision) {
            Observation::Value(self.snapshot())
        } else if self.closed {
            Observation::Closed(self.revision)
        } else {
            Observation::Unchanged
        }
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            value: self.value.clone(),
            revision: self.revision,
        }
    }
}
