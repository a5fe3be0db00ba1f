//! # stateflow
//!
//! **stateflow** is a conflated, multi-observer state cell for Rust.
//!
//! Any number of producers publish a continuously updated value; any number
//! of consumers observe its evolution, each at its own pace. Producers never
//! block on slow consumers, and consumers never see a value older than one
//! they already observed. Intermediate values may be skipped (conflation),
//! never queued.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  producer #1 │   │  producer #2 │   │  producer #N │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ publish(v)       │                  │   (non-blocking, O(1))
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StateCell                                                        │
//! │  - Slot { value, revision, closed } behind one short lock         │
//! │  - Notify (wakes waiting cursors after each publish / close)      │
//! │  - Registry (ids of attached cursors, for shutdown fencing)       │
//! │  - Bus (lifecycle events: attach, detach, close, drain)           │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │   Cursor A   │   │   Cursor B   │   │   Cursor C   │   │
//!     │ last_seen=41 │   │ last_seen=45 │   │  (waiting)   │   │
//!     └──────────────┘   └──────────────┘   └──────────────┘   ▼
//!                                                     ┌────────────────┐
//!                                                     │ SubscriberSet  │
//!                                                     │ (LogWriter,...)│
//!                                                     └────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! StateCell::new(seed) ──► publish(..)* ──► close() ──► shutdown(): wait for detach (≤ grace)
//!
//! Cursor:
//!   subscribe() ──► next() ─┬─► value (revision changed since last_seen)
//!                           ├─► waits (nothing new; cancellable, cancel-safe)
//!                           └─► Err(Closed) once closed and final value seen
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **State cell**    | Publish, conditional publish, tear-free snapshots.            | [`StateCell`], [`Snapshot`]                |
//! | **Observation**   | Per-consumer cursors, streams, blocking reads, cancellation.  | [`Cursor`], [`CursorState`]                |
//! | **Lifecycle**     | Idempotent close, shutdown with grace, observer fencing.      | [`StateCell::shutdown`], [`CursorId`]      |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics).                | [`Subscribe`], [`SubscriberSet`]           |
//! | **Errors**        | Typed terminal signals and rejections.                        | [`PublishError`], [`ObserveError`], [`RuntimeError`] |
//! | **Configuration** | Bus capacity and shutdown grace.                              | [`Config`], [`StateCellBuilder`]           |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (writes through `tracing`).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use stateflow::StateCell;
//!
//! #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cell = StateCell::builder(0u64).with_name("progress").build();
//!
//!     let mut cursor = cell.subscribe();
//!     let token = CancellationToken::new();
//!     let consumer = tokio::spawn(async move {
//!         let mut last = 0;
//!         loop {
//!             match cursor.next_or_cancel(&token).await {
//!                 Ok(v) => {
//!                     assert!(v >= last);
//!                     last = v;
//!                 }
//!                 // Closed (or cancelled): the final value has been seen.
//!                 Err(_) => return last,
//!             }
//!         }
//!     });
//!
//!     for v in 1..=1_000 {
//!         cell.publish(v)?;
//!     }
//!     cell.shutdown_within(Duration::from_secs(5)).await?;
//!     assert_eq!(consumer.await?, 1_000);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{Config, Cursor, CursorId, CursorState, Snapshot, StateCell, StateCellBuilder};
pub use error::{ObserveError, PublishError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
