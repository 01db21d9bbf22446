//! Runtime events and the bus that carries them.
//!
//! - [`Event`] / [`EventKind`]: what happened, to which topic, and why
//! - [`Bus`]: broadcast channel every component publishes into
//!
//! Fault kinds (`ParamsFailed`, `StartFailed`, `StopFailed`, `HandlerFailed`,
//! `HandlerPanicked`, `StopGraceExceeded`) are the only way controller errors
//! surface; they never abort a reconcile pass. See [`Event::is_fault`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
