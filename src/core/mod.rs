//! Cell core: slot, cursors, registry and lifecycle.
//!
//! This module contains the implementation of the state cell. The public API
//! from this module is [`StateCell`], its [`Cursor`]s and the types they hand out.
//!
//! Internal modules:
//! - [`slot`]: the `(value, revision, closed)` triple behind one lock;
//! - [`cell`]: the shareable handle, publish and read operations;
//! - [`cursor`]: per-consumer observe protocol (wait, deliver, terminate, detach);
//! - [`registry`]: ids of attached cursors for diagnostics and shutdown fencing;
//! - [`lifecycle`]: close, drain and shutdown with grace;
//! - [`builder`] / [`config`]: construction and settings.

mod builder;
mod cell;
mod config;
mod cursor;
mod lifecycle;
mod registry;
mod slot;

pub use builder::StateCellBuilder;
pub use cell::StateCell;
pub use config::Config;
pub use cursor::{Cursor, CursorState};
pub use registry::CursorId;
pub use slot::Snapshot;
