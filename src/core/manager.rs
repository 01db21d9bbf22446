//! # Manager: the single loop that owns the application state.
//!
//! The manager is the only writer of the [`RunningRegistry`](crate::core::registry::RunningRegistry)
//! and the shared db. Everything that mutates them is funnelled through its inbox
//! or its two event sources and processed one message at a time.
//!
//! ## Architecture
//! ```text
//! route source ──┐
//! command source ┼──► Manager::run() ── select! ──┬─► reconcile(route)
//! inbox ─────────┘     (AppHandle, Outbound)      ├─► dispatch(command)
//!                                                 ├─► apply db update ─► commit snapshot
//!                                                 │     (panic ─► UpdatePanicked, db kept)
//!                                                 └─► inspect registry
//!
//! reconcile(route):
//!   params() per controller ─► DesiredConfigs ─► diff(registry, desired) ─► ActionSet
//!   phase 1: detach every Stop / Restart topic, join all handlers concurrently
//!   phase 2: start every Start / Restart topic, forward RouteChanged
//! ```
//!
//! ## Rules
//! - All actions of one diff are applied before the next message is read.
//! - For one topic, teardown always completes before bring-up.
//! - Commands for topics that are not running are dropped (`CommandDropped`), never an error.
//! - A failing `params` leaves its topic exactly as it was for this pass.
//! - A panicking db update is discarded whole; the loop keeps running.
//! - Shutdown stops every running controller, then releases both sources.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream::BoxStream;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::controllers::{ControllerRef, DbUpdate};
use crate::core::diff::{Action, ActionSet, ActionSummary, DesiredConfigs, diff};
use crate::core::handler::guarded;
use crate::core::lifecycle::{Detached, Lifecycle};
use crate::core::state::AppState;
use crate::data::{AppDb, ConfigValue, RouteParams, Topic, UiCommand};
use crate::error::{RuntimeError, panic_message};
use crate::events::{Bus, Event, EventKind};

/// Messages processed by the manager loop besides its two sources.
pub(crate) enum ManagerMsg {
    /// In-process navigation (same effect as an item on the route source).
    Navigate(RouteParams),
    /// Command for a topic (from the host or from another controller).
    Command(UiCommand),
    /// State update submitted by a handler or the host.
    Update {
        origin: Option<Topic>,
        apply: DbUpdate,
    },
    /// Registry inspection.
    Inspect(oneshot::Sender<Vec<RunningInfo>>),
}

/// Public view of one running controller.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunningInfo {
    /// Topic the controller runs under.
    pub topic: String,
    /// Config it currently holds.
    pub config: ConfigValue,
    /// Total number of starts for this topic.
    pub runs: u64,
    /// Whether its handler task is still running.
    pub handler_alive: bool,
}

pub(crate) struct Manager {
    pub(crate) controllers: BTreeMap<Topic, ControllerRef>,
    pub(crate) state: AppState,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) bus: Bus,
    pub(crate) inbox: mpsc::UnboundedReceiver<ManagerMsg>,
    pub(crate) routes: Option<BoxStream<'static, RouteParams>>,
    pub(crate) commands: Option<BoxStream<'static, UiCommand>>,
    pub(crate) token: CancellationToken,
    pub(crate) stop_grace: Duration,
}

impl Manager {
    /// Runs until the token is cancelled, then shuts down.
    ///
    /// Returns the final db, or the topics whose handlers had to be aborted.
    pub(crate) async fn run(mut self, initial_route: RouteParams) -> Result<AppDb, RuntimeError> {
        self.lifecycle.commit(&self.state);
        self.reconcile(&initial_route).await;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                msg = self.inbox.recv() => match msg {
                    Some(msg) => self.on_message(msg).await,
                    None => break,
                },
                route = next_from(&mut self.routes) => match route {
                    Some(route) => self.reconcile(&route).await,
                    None => {
                        tracing::debug!("route source ended");
                        self.routes = None;
                    }
                },
                cmd = next_from(&mut self.commands) => match cmd {
                    Some(cmd) => self.dispatch(cmd),
                    None => {
                        tracing::debug!("command source ended");
                        self.commands = None;
                    }
                },
            }
        }

        self.shutdown().await
    }

    async fn on_message(&mut self, msg: ManagerMsg) {
        match msg {
            ManagerMsg::Navigate(route) => self.reconcile(&route).await,
            ManagerMsg::Command(cmd) => self.dispatch(cmd),
            ManagerMsg::Update { origin, apply } => self.apply_update(origin, apply),
            ManagerMsg::Inspect(reply) => {
                let _ = reply.send(self.running_info());
            }
        }
    }

    /// Runs a submitted update on a scratch copy of the db and keeps it only if it returns.
    fn apply_update(&mut self, origin: Option<Topic>, apply: DbUpdate) {
        let mut scratch = self.state.db.clone();
        let res = panic::catch_unwind(AssertUnwindSafe(move || {
            apply(&mut scratch);
            scratch
        }));
        match res {
            Ok(db) => {
                self.state.db = db;
                self.lifecycle.commit(&self.state);
                tracing::trace!(origin = origin.as_deref(), "db updated");
            }
            Err(panic) => {
                let info = panic_message(&*panic);
                tracing::warn!(origin = origin.as_deref(), %info, "db update panicked");
                let mut ev = Event::new(EventKind::UpdatePanicked).with_reason(info);
                if let Some(topic) = origin {
                    ev = ev.with_topic(topic);
                }
                self.bus.publish(ev);
            }
        }
    }

    /// One reconcile pass against `route`.
    async fn reconcile(&mut self, route: &RouteParams) {
        self.bus.publish(Event::new(EventKind::RouteReceived));

        let mut desired = DesiredConfigs::new();
        let mut faulted = BTreeSet::new();
        for (topic, controller) in &self.controllers {
            match guarded(|| controller.params(route)) {
                Ok(config) => {
                    desired.insert(topic.clone(), config);
                }
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::ParamsFailed)
                            .with_topic(topic.clone())
                            .with_reason(e.to_string()),
                    );
                    faulted.insert(topic.clone());
                }
            }
        }

        let running = self
            .state
            .registry
            .configs()
            .filter(|(topic, _)| !faulted.contains(*topic));
        let actions = diff(running, &desired);
        let summary = ActionSummary::of(&actions);

        self.apply(actions).await;

        self.bus.publish(
            Event::new(EventKind::ReconcileFinished).with_reason(summary.to_string()),
        );
    }

    /// Applies a diff: all teardowns first (joined concurrently), then bring-ups.
    async fn apply(&mut self, actions: ActionSet) {
        let mut detached = Vec::new();
        for (topic, action) in &actions {
            if action.tears_down() {
                if let Some(d) = self.lifecycle.detach(&mut self.state, topic) {
                    detached.push(d);
                }
            }
        }
        join_detached(&self.lifecycle, detached).await;

        for (topic, action) in actions {
            match action {
                Action::Start(config) | Action::Restart(config) => {
                    let Some(controller) = self.controllers.get(&topic) else {
                        continue;
                    };
                    // Failures are published by the lifecycle; nothing to roll back.
                    let _ = self
                        .lifecycle
                        .start(&mut self.state, &topic, controller, config);
                }
                Action::RouteChanged(config) => {
                    self.lifecycle
                        .route_changed(&mut self.state, &topic, config);
                }
                Action::Stop => {}
            }
        }
    }

    /// Forwards a command to its topic's inbound channel.
    fn dispatch(&self, cmd: UiCommand) {
        let UiCommand { topic, command } = cmd;
        let Some(entry) = self.state.registry.get(&topic) else {
            self.bus
                .publish(Event::command_dropped(&topic, &command.name, "not_running"));
            return;
        };

        let name = command.name.clone();
        if let Err(failure) = entry.inbound.try_send(command) {
            self.bus
                .publish(Event::command_dropped(&topic, &name, failure.as_label()));
        }
    }

    fn running_info(&self) -> Vec<RunningInfo> {
        self.state
            .registry
            .topics()
            .into_iter()
            .filter_map(|topic| {
                let entry = self.state.registry.get(&topic)?;
                Some(RunningInfo {
                    topic: topic.to_string(),
                    config: entry.config().clone(),
                    runs: self.state.runs(&topic),
                    handler_alive: entry.handler_alive(),
                })
            })
            .collect()
    }

    /// Stops every running controller, then releases both sources.
    async fn shutdown(mut self) -> Result<AppDb, RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        let mut detached = Vec::new();
        for topic in self.state.registry.topics() {
            if let Some(d) = self.lifecycle.detach(&mut self.state, &topic) {
                detached.push(d);
            }
        }
        let stuck = join_detached(&self.lifecycle, detached).await;

        self.routes = None;
        self.commands = None;
        self.inbox.close();
        self.lifecycle.commit(&self.state);
        self.bus.publish(Event::new(EventKind::ManagerStopped));

        if stuck.is_empty() {
            Ok(self.state.db)
        } else {
            Err(RuntimeError::StopGraceExceeded {
                grace: self.stop_grace,
                stuck: stuck.iter().map(|t| t.to_string()).collect(),
            })
        }
    }
}

/// Waits for detached handlers concurrently; returns the topics that had to be aborted.
async fn join_detached(lifecycle: &Lifecycle, detached: Vec<Detached>) -> Vec<Topic> {
    join_all(detached.into_iter().map(|d| lifecycle.finish(d)))
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect()
}

/// Next item of an optional source; pending forever once the source is gone.
async fn next_from<T>(source: &mut Option<BoxStream<'static, T>>) -> Option<T> {
    match source {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
