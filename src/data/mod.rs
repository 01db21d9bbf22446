//! Values that flow through the engine.
//!
//! - [`AppDb`] shared application state (what views render from)
//! - [`RouteParams`] parameters of the active route, delivered by the router
//! - [`Command`] a `(name, args)` pair queued on a controller's inbound channel
//! - [`UiCommand`] a `(topic, name, args)` triple sent by views
//!
//! Controller configs are plain [`serde_json::Value`]s so that equality between
//! an old and a new config is structural, not by identity.

mod command;
mod db;
mod route;

pub use command::{Command, UiCommand};
pub use db::AppDb;
pub use route::RouteParams;

/// Key under which a controller is registered.
pub type Topic = std::sync::Arc<str>;

/// Configuration a controller is started with, as returned by its `params`.
pub type ConfigValue = serde_json::Value;
