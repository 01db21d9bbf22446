//! # AppHandle: the host's grip on a running application.
//!
//! Returned by [`AppBuilder::start`](crate::AppBuilder::start). Everything the
//! host does after startup goes through it: navigation, commands, state reads,
//! event observation and shutdown.
//!
//! ```text
//! AppHandle ── navigate / send_command / update / running ──► inbox ──► Manager
//!     │
//!     ├── snapshot() / watch_db() ◄── watch<Arc<AppDb>> ◄── commit
//!     ├── events()                ◄── Bus
//!     └── stop() ── cancel token ──► Manager::shutdown ──► final AppDb
//! ```
//!
//! Dropping the handle without calling [`AppHandle::stop`] still shuts the
//! manager down, but nobody observes the result.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::manager::{ManagerMsg, RunningInfo};
use crate::core::shutdown;
use crate::data::{AppDb, RouteParams, Topic, UiCommand};
use crate::error::RuntimeError;
use crate::events::{Bus, Event};

/// Handle to a running application.
pub struct AppHandle {
    tx: mpsc::UnboundedSender<ManagerMsg>,
    token: CancellationToken,
    db: watch::Receiver<Arc<AppDb>>,
    bus: Bus,
    manager: Option<JoinHandle<Result<AppDb, RuntimeError>>>,
    listener: Option<JoinHandle<()>>,
    listener_done: CancellationToken,
}

impl AppHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<ManagerMsg>,
        token: CancellationToken,
        db: watch::Receiver<Arc<AppDb>>,
        bus: Bus,
        manager: JoinHandle<Result<AppDb, RuntimeError>>,
        listener: JoinHandle<()>,
        listener_done: CancellationToken,
    ) -> Self {
        Self {
            tx,
            token,
            db,
            bus,
            manager: Some(manager),
            listener: Some(listener),
            listener_done,
        }
    }

    /// Delivers a route change; the manager reconciles every controller against it.
    pub fn navigate(&self, route: RouteParams) -> Result<(), RuntimeError> {
        self.submit(ManagerMsg::Navigate(route))
    }

    /// Sends a command to the controller running under `topic`.
    ///
    /// Succeeds even if nothing runs under `topic`; such commands are dropped
    /// by the manager and reported as `CommandDropped`.
    pub fn send_command(
        &self,
        topic: impl Into<Topic>,
        name: impl Into<String>,
        args: Value,
    ) -> Result<(), RuntimeError> {
        self.dispatch(UiCommand::new(topic, name, args))
    }

    /// Same as [`AppHandle::send_command`] with a prebuilt [`UiCommand`].
    pub fn dispatch(&self, cmd: UiCommand) -> Result<(), RuntimeError> {
        self.submit(ManagerMsg::Command(cmd))
    }

    /// Applies `f` to the shared db on the manager loop.
    pub fn update<F>(&self, f: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(&mut AppDb) + Send + 'static,
    {
        self.submit(ManagerMsg::Update {
            origin: None,
            apply: Box::new(f),
        })
    }

    /// Latest committed snapshot of shared state.
    pub fn snapshot(&self) -> Arc<AppDb> {
        self.db.borrow().clone()
    }

    /// Receiver that observes every committed snapshot (what views render from).
    pub fn watch_db(&self) -> watch::Receiver<Arc<AppDb>> {
        self.db.clone()
    }

    /// New receiver for runtime events published from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Running controllers, ordered by topic.
    pub async fn running(&self) -> Result<Vec<RunningInfo>, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.submit(ManagerMsg::Inspect(reply))?;
        rx.await.map_err(|_| RuntimeError::ManagerGone)
    }

    /// True until shutdown has been requested or the manager has exited.
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.tx.is_closed()
    }

    /// Stops every running controller and returns the final db.
    ///
    /// Returns [`RuntimeError::StopGraceExceeded`] if some handler had to be
    /// aborted, and [`RuntimeError::ManagerGone`] if the manager task died.
    pub async fn stop(mut self) -> Result<AppDb, RuntimeError> {
        self.token.cancel();

        let res = match self.manager.take() {
            Some(join) => join.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "manager task failed");
                Err(RuntimeError::ManagerGone)
            }),
            None => Err(RuntimeError::ManagerGone),
        };

        self.listener_done.cancel();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
        res
    }

    /// Runs until SIGINT/SIGTERM/SIGQUIT (Ctrl-C on Windows), then stops.
    pub async fn stop_on_signal(self) -> Result<AppDb, RuntimeError> {
        if let Err(e) = shutdown::wait_for_shutdown_signal().await {
            tracing::warn!(error = %e, "signal registration failed, stopping now");
        }
        self.stop().await
    }

    fn submit(&self, msg: ManagerMsg) -> Result<(), RuntimeError> {
        if self.token.is_cancelled() {
            return Err(RuntimeError::ManagerGone);
        }
        self.tx.send(msg).map_err(|_| RuntimeError::ManagerGone)
    }
}

impl Drop for AppHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
