//! # Cell configuration.
//!
//! Provides [`Config`] centralized settings for a state cell's ambient runtime:
//! the lifecycle event bus and the shutdown grace period.
//!
//! Config is used in two ways:
//! 1. **Cell creation**: `StateCell::builder(seed).with_config(cfg).build()`
//! 2. **Shutdown**: `StateCell::shutdown()` waits up to [`Config::grace`]
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - `grace = 0s` → do not wait for observers to detach

use std::time::Duration;

/// Configuration for a state cell.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `grace`: Maximum wait for attached cursors to detach after close
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the lifecycle event bus ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` events will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Maximum time `shutdown()` waits for cursors to detach after close.
    ///
    /// If the grace period runs out, shutdown returns
    /// `RuntimeError::GraceExceeded` with the ids of the cursors still attached.
    pub grace: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the grace period as an `Option`.
    ///
    /// - `None` → close without waiting for observers
    /// - `Some(d)` → wait up to `d`
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `grace = 10s`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            grace: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let cfg = Config {
            bus_capacity: 0,
            grace: Duration::ZERO,
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.grace_period(), None);
        assert_eq!(Config::default().grace_period(), Some(Duration::from_secs(10)));
    }
}
