//! # Manager configuration.
//!
//! Provides [`ManagerConfig`], the settings of one running application.
//!
//! ## Sentinel values
//! - `stop_grace = 0s` → give the handler one scheduler turn to exit, then abort it
//! - `bus_capacity` / `inbound_capacity` → clamped to at least 1

use std::time::Duration;

/// Runtime settings for the controller manager.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1)
/// - `inbound_capacity`: Per-controller command queue size (min 1)
/// - `stop_grace`: How long a stop waits for the handler task to exit
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers lagging more than `bus_capacity` events skip the oldest ones.
    pub bus_capacity: usize,

    /// Capacity of each controller's inbound queue.
    ///
    /// Commands arriving while the queue is full are dropped and reported
    /// with `CommandDropped` (`reason = "inbound_full"`).
    pub inbound_capacity: usize,

    /// Maximum wait for a handler to exit after its channel was closed.
    ///
    /// On expiry the task is aborted and `StopGraceExceeded` is published.
    /// A restart never spawns the new handler before the old one is gone.
    pub stop_grace: Duration,
}

impl ManagerConfig {
    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Inbound capacity clamped to a minimum of 1.
    #[inline]
    pub fn inbound_capacity_clamped(&self) -> usize {
        self.inbound_capacity.max(1)
    }

    /// Grace as an `Option` (`None` = one scheduler turn, then abort).
    #[inline]
    pub fn stop_grace(&self) -> Option<Duration> {
        if self.stop_grace == Duration::ZERO {
            None
        } else {
            Some(self.stop_grace)
        }
    }
}

impl Default for ManagerConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `inbound_capacity = 1024`
    /// - `stop_grace = 5s`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            inbound_capacity: 1024,
            stop_grace: Duration::from_secs(5),
        }
    }
}
