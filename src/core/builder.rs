use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::controllers::ControllerRef;
use crate::core::config::ManagerConfig;
use crate::core::handle::AppHandle;
use crate::core::lifecycle::Lifecycle;
use crate::core::manager::Manager;
use crate::core::state::AppState;
use crate::data::{AppDb, RouteParams, Topic, UiCommand};
use crate::error::RuntimeError;
use crate::events::{Bus, Event};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for assembling and starting an application.
///
/// # Example
/// ```no_run
/// use routevisor::{AppBuilder, ControllerFn, ManagerConfig, RouteParams};
/// use serde_json::json;
///
/// # async fn demo() -> Result<(), routevisor::RuntimeError> {
/// let users = ControllerFn::always(json!(true)).arc();
///
/// let app = AppBuilder::new(ManagerConfig::default())
///     .controller("users", users)
///     .initial_route(RouteParams::new().with("page", json!(1)))
///     .start()?;
///
/// let db = app.stop().await?;
/// # let _ = db;
/// # Ok(())
/// # }
/// ```
pub struct AppBuilder {
    cfg: ManagerConfig,
    controllers: BTreeMap<Topic, ControllerRef>,
    duplicate: Option<String>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    routes: Option<BoxStream<'static, RouteParams>>,
    commands: Option<BoxStream<'static, UiCommand>>,
    initial_db: AppDb,
    initial_route: RouteParams,
}

impl AppBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: ManagerConfig) -> Self {
        Self {
            cfg,
            controllers: BTreeMap::new(),
            duplicate: None,
            subscribers: Vec::new(),
            routes: None,
            commands: None,
            initial_db: AppDb::new(),
            initial_route: RouteParams::new(),
        }
    }

    /// Registers `controller` under `topic`.
    ///
    /// Registering the same topic twice makes [`AppBuilder::start`] fail with
    /// [`RuntimeError::DuplicateTopic`].
    pub fn controller(mut self, topic: impl Into<Topic>, controller: ControllerRef) -> Self {
        let topic = topic.into();
        if self.controllers.contains_key(&topic) {
            self.duplicate.get_or_insert_with(|| topic.to_string());
        } else {
            self.controllers.insert(topic, controller);
        }
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Stream of route changes (the router). Each item triggers a reconcile pass.
    pub fn route_source<S>(mut self, routes: S) -> Self
    where
        S: Stream<Item = RouteParams> + Send + 'static,
    {
        self.routes = Some(routes.boxed());
        self
    }

    /// Stream of UI commands. Each item is routed to its topic's inbound channel.
    pub fn command_source<S>(mut self, commands: S) -> Self
    where
        S: Stream<Item = UiCommand> + Send + 'static,
    {
        self.commands = Some(commands.boxed());
        self
    }

    /// Shared state the application starts with (empty by default).
    pub fn initial_db(mut self, db: AppDb) -> Self {
        self.initial_db = db;
        self
    }

    /// Route reconciled once before any source is read (empty by default).
    pub fn initial_route(mut self, route: RouteParams) -> Self {
        self.initial_route = route;
        self
    }

    /// Spawns the manager loop and the subscriber listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<AppHandle, RuntimeError> {
        if let Some(topic) = self.duplicate {
            return Err(RuntimeError::DuplicateTopic { topic });
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let listener_done = CancellationToken::new();
        let listener = subscriber_listener(bus.subscribe(), subs, listener_done.clone());

        let state = AppState::new(self.initial_db);
        let (snapshots, db_rx) = watch::channel(state.snapshot());
        let (tx, inbox) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        let manager = Manager {
            controllers: self.controllers,
            state,
            lifecycle: Lifecycle::new(&self.cfg, bus.clone(), tx.clone(), snapshots),
            bus: bus.clone(),
            inbox,
            routes: self.routes,
            commands: self.commands,
            token: token.clone(),
            stop_grace: self.cfg.stop_grace,
        };
        let join = tokio::spawn(manager.run(self.initial_route));

        Ok(AppHandle::new(
            tx,
            token,
            db_rx,
            bus,
            join,
            listener,
            listener_done,
        ))
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

/// Forwards bus events to the subscriber set until `done`, then drains and shuts it down.
fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    subs: SubscriberSet,
    done: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ev = rx.recv() => match ev {
                    Ok(ev) => subs.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = done.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        subs.emit(&ev);
                    }
                    break;
                }
            }
        }
        subs.shutdown().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::ControllerFn;
    use serde_json::json;

    #[tokio::test]
    async fn duplicate_topic_is_rejected() {
        let res = AppBuilder::default()
            .controller("users", ControllerFn::always(json!(true)).arc())
            .controller("users", ControllerFn::always(json!(false)).arc())
            .start();
        match res {
            Err(RuntimeError::DuplicateTopic { topic }) => assert_eq!(topic, "users"),
            _ => panic!("expected DuplicateTopic"),
        }
    }

    #[tokio::test]
    async fn initial_route_is_reconciled_on_start() {
        let app = AppBuilder::default()
            .controller("users", ControllerFn::always(json!(true)).arc())
            .start()
            .unwrap();

        let running = app.running().await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].topic, "users");
        assert_eq!(running[0].runs, 1);

        app.stop().await.unwrap();
    }
}
