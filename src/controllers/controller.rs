//! # Controller abstraction.
//!
//! A controller is registered under a topic and selected through a topic-keyed
//! table. The engine calls [`params`](Controller::params) on every route change
//! to decide whether the controller should run and with which config, then
//! drives [`start`](Controller::start) / [`stop`](Controller::stop) and keeps
//! one [`handle`](Controller::handle) task alive while it runs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::controllers::HandlerContext;
use crate::data::{AppDb, ConfigValue, RouteParams};
use crate::error::ControllerError;

/// # Route-driven, long-running unit.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use routevisor::{AppDb, ConfigValue, Controller, ControllerError, HandlerContext, RouteParams};
/// use serde_json::json;
///
/// struct News;
///
/// #[async_trait]
/// impl Controller for News {
///     fn params(&self, route: &RouteParams) -> Result<Option<ConfigValue>, ControllerError> {
///         Ok(match route.get_str("page") {
///             Some("news") => Some(json!({"page": route.get("p").cloned().unwrap_or(json!(1))})),
///             _ => None,
///         })
///     }
///
///     fn start(&self, config: &ConfigValue, db: AppDb) -> Result<AppDb, ControllerError> {
///         Ok(db.with("news-page", config["page"].clone()))
///     }
///
///     async fn handle(&self, mut ctx: HandlerContext) -> Result<(), ControllerError> {
///         while let Some(cmd) = ctx.inbound.recv().await {
///             if cmd.name == "reload" {
///                 ctx.outbound.update(|db| { db.insert("news-reloaded", true); })?;
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// Derives this controller's config from the route.
    ///
    /// `Ok(None)` means the controller should not run on this route. An error
    /// leaves the topic untouched for the current reconcile pass.
    fn params(&self, route: &RouteParams) -> Result<Option<ConfigValue>, ControllerError>;

    /// Called once before the handler task is spawned. Returns the new db.
    fn start(&self, _config: &ConfigValue, db: AppDb) -> Result<AppDb, ControllerError> {
        Ok(db)
    }

    /// Called when the controller is torn down. Returns the new db.
    ///
    /// Must not fail for a controller that was never started.
    fn stop(&self, _config: &ConfigValue, db: AppDb) -> Result<AppDb, ControllerError> {
        Ok(db)
    }

    /// Long-running command loop.
    ///
    /// Must return promptly once [`ctx.inbound`](HandlerContext::inbound) is
    /// closed; that is the only cancellation signal. The default drains
    /// commands until then.
    ///
    /// Closing wins over the queue: commands still pending when the channel
    /// closes (a trailing `route-changed` included) are never delivered, since
    /// [`stop`](Controller::stop) has already run by then.
    async fn handle(&self, mut ctx: HandlerContext) -> Result<(), ControllerError> {
        while ctx.inbound.recv().await.is_some() {}
        Ok(())
    }
}

/// Shared handle to a controller.
pub type ControllerRef = Arc<dyn Controller>;
