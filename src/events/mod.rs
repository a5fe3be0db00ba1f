//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by a state cell, its cursors and its
//! lifecycle controller.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `StateCell` (close, rejected publish, shutdown),
//!   `Cursor` (attach, detach, cancel, terminate), `SubscriberSet` workers
//!   (overflow/panic).
//! - **Consumers**: the builder's listener task (fans out to `SubscriberSet`)
//!   and any receiver obtained from `StateCell::events()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
