//! # Event subscribers for the routevisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Manager / Handlers ── publish(Event) ──► Bus ──► subscriber listener
//!                                                        │
//!                                                        ▼
//!                                                  SubscriberSet::emit
//!                                            ┌───────────┼───────────┐
//!                                            ▼           ▼           ▼
//!                                        LogWriter    Metrics     Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use routevisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FaultCounter;
//!
//! #[async_trait]
//! impl Subscribe for FaultCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.is_fault() {
//!             // increment fault counter
//!         }
//!     }
//!     fn name(&self) -> &'static str { "fault-counter" }
//! }
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
