//! # What a running handler works with.
//!
//! [`HandlerContext`] bundles the three things `handle` receives: a read-only
//! view of shared state, the inbound command queue, and an [`Outbound`] handle
//! for talking back to the manager. Handlers never touch the registry; state
//! changes are submitted as closures and applied on the manager loop.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::controllers::Inbound;
use crate::core::ManagerMsg;
use crate::data::{AppDb, ConfigValue, Topic, UiCommand};
use crate::error::ControllerError;

/// State update applied by the manager loop.
pub type DbUpdate = Box<dyn FnOnce(&mut AppDb) + Send + 'static>;

/// Everything a controller's `handle` loop receives.
pub struct HandlerContext {
    /// Topic the controller runs under.
    pub topic: Topic,
    /// Config the controller was started with.
    pub config: ConfigValue,
    /// Command queue; closing it is the cancellation signal.
    pub inbound: Inbound,
    /// Channel back to the manager.
    pub outbound: Outbound,
    db: watch::Receiver<Arc<AppDb>>,
}

impl HandlerContext {
    pub(crate) fn new(
        topic: Topic,
        config: ConfigValue,
        inbound: Inbound,
        outbound: Outbound,
        db: watch::Receiver<Arc<AppDb>>,
    ) -> Self {
        Self {
            topic,
            config,
            inbound,
            outbound,
            db,
        }
    }

    /// Latest committed snapshot of shared state.
    pub fn db(&self) -> Arc<AppDb> {
        self.db.borrow().clone()
    }

    /// Receiver that observes every committed snapshot.
    pub fn watch_db(&self) -> watch::Receiver<Arc<AppDb>> {
        self.db.clone()
    }
}

/// Handle a controller uses to reach the manager loop.
#[derive(Clone)]
pub struct Outbound {
    topic: Topic,
    tx: mpsc::UnboundedSender<ManagerMsg>,
}

impl Outbound {
    pub(crate) fn new(topic: Topic, tx: mpsc::UnboundedSender<ManagerMsg>) -> Self {
        Self { topic, tx }
    }

    /// Sends a command to the controller running under `topic`.
    ///
    /// Routed exactly like a UI command: dropped silently if `topic` is not running.
    pub fn send(
        &self,
        topic: impl Into<Topic>,
        name: impl Into<String>,
        args: Value,
    ) -> Result<(), ControllerError> {
        self.submit(ManagerMsg::Command(UiCommand::new(topic, name, args)))
    }

    /// Submits a state update; the manager applies it and publishes a new snapshot.
    pub fn update<F>(&self, f: F) -> Result<(), ControllerError>
    where
        F: FnOnce(&mut AppDb) + Send + 'static,
    {
        self.submit(ManagerMsg::Update {
            origin: Some(self.topic.clone()),
            apply: Box::new(f),
        })
    }

    fn submit(&self, msg: ManagerMsg) -> Result<(), ControllerError> {
        self.tx.send(msg).map_err(|_| ControllerError::Closed)
    }
}
