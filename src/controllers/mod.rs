//! Controllers: the long-running units the engine starts and stops.
//!
//! - [`Controller`] the capability set (`params`, `start`, `stop`, `handle`)
//! - [`ControllerFn`] closure-backed implementation for small controllers
//! - [`Inbound`] / [`InboundSender`] the closable per-controller command queue
//! - [`HandlerContext`] / [`Outbound`] what a running handler gets to work with

mod channel;
mod context;
mod controller;
mod controller_fn;

pub use channel::{Inbound, InboundSender, SendFailure, channel};
pub use context::{DbUpdate, HandlerContext, Outbound};
pub use controller::{Controller, ControllerRef};
pub use controller_fn::ControllerFn;
