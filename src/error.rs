//! Error types used by the state cell, its cursors and its lifecycle.
//!
//! This module defines three error enums:
//!
//! - [`PublishError`]: a producer's update was not applied.
//! - [`ObserveError`]: a cursor reached a terminal signal instead of a value.
//! - [`RuntimeError`]: shutdown orchestration did not complete in time.
//!
//! All of them provide `as_label` (stable snake_case label for logs/metrics).
//! None of them is fatal: every failure is local to the caller and recoverable
//! by re-attaching a cursor or recreating the cell.

use std::time::Duration;
use thiserror::Error;

use crate::core::CursorId;

/// # Errors produced by publishing into a cell.
///
/// The rejected value is always handed back to the caller, so a publish
/// after close is never silently swallowed.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PublishError<T> {
    /// The cell was closed before this publish; the slot was not touched.
    #[error("publish rejected: cell is closed")]
    Closed(T),

    /// A conditional publish lost the race against another producer.
    #[error("publish rejected: expected revision {expected}, found {actual}")]
    RevisionMismatch {
        /// Revision the producer based its update on.
        expected: u64,
        /// Revision stored in the cell at the time of the attempt.
        actual: u64,
        /// The rejected value.
        value: T,
    },
}

impl<T> PublishError<T> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stateflow::PublishError;
    ///
    /// let err = PublishError::Closed(7u64);
    /// assert_eq!(err.as_label(), "publish_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Closed(_) => "publish_closed",
            PublishError::RevisionMismatch { .. } => "publish_revision_mismatch",
        }
    }

    /// Recovers the value that was not published.
    pub fn into_inner(self) -> T {
        match self {
            PublishError::Closed(value) => value,
            PublishError::RevisionMismatch { value, .. } => value,
        }
    }

    /// True if the publish failed because the cell is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, PublishError::Closed(_))
    }
}

/// # Terminal signals delivered to an observer cursor.
///
/// These are defined outcomes of the observe protocol, not bugs.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveError {
    /// The cell was closed and the cursor has seen its final revision.
    #[error("cell closed")]
    Closed,

    /// The consumer's cancellation token fired while the cursor was waiting.
    #[error("observation cancelled")]
    Cancelled,
}

impl ObserveError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stateflow::ObserveError;
    ///
    /// assert_eq!(ObserveError::Closed.as_label(), "observe_closed");
    /// assert_eq!(ObserveError::Cancelled.as_label(), "observe_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ObserveError::Closed => "observe_closed",
            ObserveError::Cancelled => "observe_cancelled",
        }
    }
}

/// # Errors produced by lifecycle orchestration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Observers were still attached when the shutdown grace period ran out.
    #[error("shutdown timeout {grace:?} exceeded; still attached: {stuck:?}")]
    GraceExceeded {
        /// The grace duration that was exceeded.
        grace: Duration,
        /// Ids of cursors that had not detached in time.
        stuck: Vec<CursorId>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stateflow::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; attached cursors={stuck:?}")
            }
        }
    }
}
