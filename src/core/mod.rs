//! Runtime core: reconciliation and lifecycle.
//!
//! The public surface is [`AppBuilder`] / [`AppHandle`], the pure [`diff`]
//! function and [`ManagerConfig`]. Everything else runs on the manager loop.
//!
//! Internal modules:
//! - [`diff`]: running set vs desired configs → one action per topic;
//! - [`lifecycle`]: start / stop / restart / route-changed for one topic;
//! - [`manager`]: the single loop owning the application state;
//! - [`handler`]: spawns handler tasks and isolates panics;
//! - [`registry`]: running controllers by topic;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod diff;
mod handle;
mod handler;
mod lifecycle;
mod manager;
mod registry;
mod shutdown;
mod state;

pub(crate) use manager::ManagerMsg;

pub use builder::AppBuilder;
pub use config::ManagerConfig;
pub use diff::{Action, ActionKind, ActionSet, ActionSummary, DesiredConfigs, diff};
pub use handle::AppHandle;
pub use manager::RunningInfo;
