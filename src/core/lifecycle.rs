//! # Lifecycle orchestrator: applies one action to one controller.
//!
//! ```text
//! start          controller.start ─► bump runs ─► commit ─► new channel ─► spawn handler ─► insert entry
//! detach         remove entry ─► controller.stop ─► commit ─► close channel
//! finish         join handler (grace) ─► abort on expiry
//! route_changed  replace config ─► queue (route-changed, config) on the existing channel
//! ```
//!
//! A stop is `detach` followed by `finish`; a restart is a stop followed by
//! `start`. The manager drives both so that every teardown of one reconcile
//! pass is joined concurrently before any bring-up.
//!
//! ## Rules
//! - `start` failure: nothing is inserted, runs are not bumped.
//! - `stop` failure: the entry is still removed and its channel closed.
//! - A detached handler is finished before the next start of the same topic, so a
//!   topic never has two live handler tasks.
//! - Finishing a topic whose handler already died returns immediately.
//! - No retries; every fault is published on the bus.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{self, JoinHandle};
use tokio::time;

use crate::controllers::{ControllerRef, HandlerContext, Outbound, channel};
use crate::core::ManagerMsg;
use crate::core::config::ManagerConfig;
use crate::core::handler::{guarded, spawn_handler};
use crate::core::registry::RunningEntry;
use crate::core::state::AppState;
use crate::data::{AppDb, Command, ConfigValue, Topic};
use crate::error::ControllerError;
use crate::events::{Bus, Event, EventKind};

/// A controller that has been stopped but whose handler may still be winding down.
pub(crate) struct Detached {
    topic: Topic,
    join: JoinHandle<()>,
}

/// Applies lifecycle actions to [`AppState`].
pub(crate) struct Lifecycle {
    bus: Bus,
    inbound_capacity: usize,
    stop_grace: Option<Duration>,
    outbound: mpsc::UnboundedSender<ManagerMsg>,
    snapshots: watch::Sender<Arc<AppDb>>,
}

impl Lifecycle {
    pub(crate) fn new(
        cfg: &ManagerConfig,
        bus: Bus,
        outbound: mpsc::UnboundedSender<ManagerMsg>,
        snapshots: watch::Sender<Arc<AppDb>>,
    ) -> Self {
        Self {
            bus,
            inbound_capacity: cfg.inbound_capacity_clamped(),
            stop_grace: cfg.stop_grace(),
            outbound,
            snapshots,
        }
    }

    /// Publishes the current db to snapshot readers.
    pub(crate) fn commit(&self, state: &AppState) {
        self.snapshots.send_replace(state.snapshot());
    }

    /// Starts `controller` under `topic` with `config`. Returns the new run count.
    pub(crate) fn start(
        &self,
        state: &mut AppState,
        topic: &Topic,
        controller: &ControllerRef,
        config: ConfigValue,
    ) -> Result<u64, ControllerError> {
        let db = state.db.clone();
        let db = match guarded(|| controller.start(&config, db)) {
            Ok(db) => db,
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::StartFailed)
                        .with_topic(topic.clone())
                        .with_reason(e.to_string()),
                );
                return Err(e);
            }
        };
        state.db = db;
        let runs = state.bump_runs(topic);
        self.commit(state);

        let (inbound_tx, inbound) = channel(self.inbound_capacity);
        let ctx = HandlerContext::new(
            topic.clone(),
            config.clone(),
            inbound,
            Outbound::new(topic.clone(), self.outbound.clone()),
            self.snapshots.subscribe(),
        );
        let join = spawn_handler(Arc::clone(controller), ctx, self.bus.clone());

        let entry = RunningEntry {
            controller: Arc::clone(controller),
            config,
            inbound: inbound_tx,
            join,
        };
        if let Some(stale) = state.registry.insert(topic.clone(), entry) {
            // Callers stop before starting; never leave an orphan running.
            tracing::warn!(topic = &**topic, "start replaced a running entry");
            stale.inbound.close();
            stale.join.abort();
        }

        self.bus.publish(
            Event::new(EventKind::ControllerStarted)
                .with_topic(topic.clone())
                .with_runs(runs),
        );
        Ok(runs)
    }

    /// Synchronous half of `stop`: removes the entry, runs `controller.stop`,
    /// closes the channel. `None` if `topic` is not running.
    pub(crate) fn detach(&self, state: &mut AppState, topic: &str) -> Option<Detached> {
        let Some((topic, entry)) = state.registry.remove_entry(topic) else {
            tracing::debug!(topic, "stop for a topic that is not running");
            return None;
        };

        let db = state.db.clone();
        match guarded(|| entry.controller.stop(&entry.config, db)) {
            Ok(db) => {
                state.db = db;
                self.commit(state);
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::StopFailed)
                        .with_topic(topic.clone())
                        .with_reason(e.to_string()),
                );
            }
        }

        entry.inbound.close();
        self.bus
            .publish(Event::new(EventKind::ControllerStopped).with_topic(topic.clone()));

        Some(Detached {
            topic,
            join: entry.join,
        })
    }

    /// Asynchronous half of `stop`: waits for the handler to exit, aborting it
    /// once the grace expires. `Err(topic)` if the grace was exceeded.
    pub(crate) async fn finish(&self, detached: Detached) -> Result<(), Topic> {
        let Detached { topic, mut join } = detached;

        let Some(grace) = self.stop_grace else {
            // One scheduler turn to observe the closed channel.
            task::yield_now().await;
            if !join.is_finished() {
                join.abort();
            }
            let _ = join.await;
            return Ok(());
        };

        if time::timeout(grace, &mut join).await.is_ok() {
            return Ok(());
        }

        join.abort();
        let _ = join.await;
        self.bus.publish(
            Event::new(EventKind::StopGraceExceeded)
                .with_topic(topic.clone())
                .with_timeout(grace),
        );
        Err(topic)
    }

    /// Replaces the stored config and forwards `(route-changed, config)`.
    /// Returns `false` if `topic` is not running.
    pub(crate) fn route_changed(
        &self,
        state: &mut AppState,
        topic: &str,
        config: ConfigValue,
    ) -> bool {
        let Some(entry) = state.registry.get_mut(topic) else {
            return false;
        };
        entry.config = config.clone();

        match entry.inbound.try_send(Command::route_changed(config)) {
            Ok(()) => self
                .bus
                .publish(Event::new(EventKind::RouteForwarded).with_topic(topic)),
            Err(failure) => self.bus.publish(Event::command_dropped(
                topic,
                Command::ROUTE_CHANGED,
                failure.as_label(),
            )),
        }
        true
    }
}
