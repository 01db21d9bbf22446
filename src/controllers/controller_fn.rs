//! # Closure-backed controller (`ControllerFn`)
//!
//! [`ControllerFn`] assembles a controller from closures, for controllers too
//! small to deserve their own type.
//!
//! ## Example
//! ```rust
//! use routevisor::{Controller, ControllerFn, ControllerRef, RouteParams};
//! use serde_json::json;
//!
//! let users: ControllerRef = ControllerFn::new(|route: &RouteParams| {
//!     Ok(route.get("user_id").cloned())
//! })
//! .on_start(|config, db| Ok(db.with("current-user", config.clone())))
//! .on_stop(|_config, mut db| {
//!     db.remove("current-user");
//!     Ok(db)
//! })
//! .arc();
//!
//! let route = RouteParams::new().with("user_id", 7);
//! assert_eq!(users.params(&route).unwrap(), Some(json!(7)));
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::controllers::{Controller, ControllerRef, HandlerContext};
use crate::data::{AppDb, ConfigValue, RouteParams};
use crate::error::ControllerError;

type ParamsFn =
    Box<dyn Fn(&RouteParams) -> Result<Option<ConfigValue>, ControllerError> + Send + Sync>;
type LifecycleFn =
    Box<dyn Fn(&ConfigValue, AppDb) -> Result<AppDb, ControllerError> + Send + Sync>;
type HandleFn =
    Box<dyn Fn(HandlerContext) -> BoxFuture<'static, Result<(), ControllerError>> + Send + Sync>;

/// Function-backed controller.
pub struct ControllerFn {
    params: ParamsFn,
    start: Option<LifecycleFn>,
    stop: Option<LifecycleFn>,
    handle: Option<HandleFn>,
}

impl ControllerFn {
    /// Creates a controller from its `params` closure.
    pub fn new<P>(params: P) -> Self
    where
        P: Fn(&RouteParams) -> Result<Option<ConfigValue>, ControllerError> + Send + Sync + 'static,
    {
        Self {
            params: Box::new(params),
            start: None,
            stop: None,
            handle: None,
        }
    }

    /// Controller that runs on every route with the same `config`.
    pub fn always(config: ConfigValue) -> Self {
        Self::new(move |_route| Ok(Some(config.clone())))
    }

    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConfigValue, AppDb) -> Result<AppDb, ControllerError> + Send + Sync + 'static,
    {
        self.start = Some(Box::new(f));
        self
    }

    pub fn on_stop<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConfigValue, AppDb) -> Result<AppDb, ControllerError> + Send + Sync + 'static,
    {
        self.stop = Some(Box::new(f));
        self
    }

    /// Sets the handler loop. A fresh future is created per start.
    pub fn on_handle<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ControllerError>> + Send + 'static,
    {
        self.handle = Some(Box::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    /// Wraps the controller into a shared [`ControllerRef`].
    pub fn arc(self) -> ControllerRef {
        Arc::new(self)
    }
}

#[async_trait]
impl Controller for ControllerFn {
    fn params(&self, route: &RouteParams) -> Result<Option<ConfigValue>, ControllerError> {
        (self.params)(route)
    }

    fn start(&self, config: &ConfigValue, db: AppDb) -> Result<AppDb, ControllerError> {
        match &self.start {
            Some(f) => f(config, db),
            None => Ok(db),
        }
    }

    fn stop(&self, config: &ConfigValue, db: AppDb) -> Result<AppDb, ControllerError> {
        match &self.stop {
            Some(f) => f(config, db),
            None => Ok(db),
        }
    }

    async fn handle(&self, mut ctx: HandlerContext) -> Result<(), ControllerError> {
        match &self.handle {
            Some(f) => f(ctx).await,
            None => {
                while ctx.inbound.recv().await.is_some() {}
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_pass_db_through() {
        let c = ControllerFn::always(json!(true));
        let db = AppDb::new().with("k", 1);
        assert_eq!(c.start(&json!(true), db.clone()).unwrap(), db);
        assert_eq!(c.stop(&json!(true), db.clone()).unwrap(), db);
        assert_eq!(c.params(&RouteParams::new()).unwrap(), Some(json!(true)));
    }

    #[test]
    fn params_errors_surface() {
        let c = ControllerFn::new(|_| Err(ControllerError::invalid_params("no id")));
        assert_eq!(
            c.params(&RouteParams::new()),
            Err(ControllerError::invalid_params("no id"))
        );
    }
}
