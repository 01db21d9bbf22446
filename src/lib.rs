//! # routevisor
//!
//! **Routevisor** is a route-driven controller lifecycle engine for Rust.
//!
//! An application registers *controllers* under *topics*. Whenever the active
//! route changes, every controller derives the config it wants from the route
//! parameters; the engine diffs those wishes against what is running and starts,
//! stops, restarts or notifies each controller so the running set matches the route.
//! Running controllers receive UI commands on a private queue and write shared
//! state back through the manager.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   route source          command source           AppHandle (host)
//!   (RouteParams)         (UiCommand)              navigate / send_command / update
//!        │                     │                         │
//!        ▼                     ▼                         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Manager (single loop, owns AppState)                             │
//! │  - controllers: Topic → Controller                                │
//! │  - RunningRegistry: Topic → { config, inbound sender, handler }   │
//! │  - AppDb (shared state, published as watch snapshots)             │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        │ reconcile        │ dispatch         │ commit        │ publish
//!        ▼                  ▼                  ▼               ▼
//!   diff() ─► Lifecycle   Inbound queue     watch<AppDb>     Bus (broadcast)
//!   start/stop/restart/     │                  │               │
//!   route_changed           ▼                  ▼               ▼
//!                      handler task        views / host   subscriber listener
//!                      (Controller::handle)                    │
//!                           │ Outbound                         ▼
//!                           └── send / update ──► Manager  SubscriberSet
//!                                                          ┌────┼────┐
//!                                                          ▼    ▼    ▼
//!                                                       LogWriter  custom
//! ```
//!
//! ### Reconcile pass
//! ```text
//! route ──► params(route) per controller ──► DesiredConfigs
//!                                               │
//!   RunningRegistry (topic → config) ──► diff ◄─┘
//!                                         │
//!   running  desired       action         ▼
//!   yes      nil / absent  Stop           phase 1: Stop, Restart(teardown)  (joined)
//!   no       config        Start          phase 2: Start, Restart(bring-up),
//!   yes      == running    RouteChanged            RouteChanged ─► queue ("route-changed", config)
//!   yes      != running    Restart
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                          |
//! |-------------------|----------------------------------------------------------------|---------------------------------------------|
//! | **Controllers**   | Declare params/start/stop/handle for one topic.                | [`Controller`], [`ControllerFn`]            |
//! | **Reconciliation**| Pure running-set differ.                                       | [`diff`], [`Action`], [`DesiredConfigs`]    |
//! | **Runtime**       | Start the manager, navigate, send commands, stop.              | [`AppBuilder`], [`AppHandle`]               |
//! | **Data**          | Shared state, route params, commands.                          | [`AppDb`], [`RouteParams`], [`UiCommand`]   |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).         | [`Subscribe`], [`Event`], [`EventKind`]     |
//! | **Errors**        | Typed errors for the runtime and for controllers.              | [`RuntimeError`], [`ControllerError`]       |
//! | **Configuration** | Queue capacities and stop grace.                               | [`ManagerConfig`]                           |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber backed by `tracing`.
//!
//! ## Example
//! ```rust
//! use routevisor::{AppBuilder, ControllerError, ControllerFn, HandlerContext, ManagerConfig, RouteParams};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Runs only when the route carries a `page`, with that page as config.
//!     let news = ControllerFn::new(|route: &RouteParams| {
//!         Ok(route.get("page").map(|page| json!({ "page": page })))
//!     })
//!     .on_start(|config, mut db| {
//!         db.insert("news", json!({ "page": config["page"], "items": [] }));
//!         Ok(db)
//!     })
//!     .on_stop(|_config, mut db| {
//!         db.remove("news");
//!         Ok(db)
//!     })
//!     .on_handle(|mut ctx: HandlerContext| async move {
//!         while let Some(cmd) = ctx.inbound.recv().await {
//!             if cmd.name == "load" {
//!                 ctx.outbound.update(|db| {
//!                     db.insert("loaded", true);
//!                 })?;
//!             }
//!         }
//!         Ok::<(), ControllerError>(())
//!     })
//!     .arc();
//!
//!     let app = AppBuilder::new(ManagerConfig::default())
//!         .controller("news", news)
//!         .initial_route(RouteParams::new().with("page", 1))
//!         .start()?;
//!
//!     app.send_command("news", "load", json!(null))?;
//!     app.navigate(RouteParams::new())?; // no page: news stops
//!
//!     let db = app.stop().await?;
//!     assert!(db.get("news").is_none());
//!     Ok(())
//! }
//! ```

mod controllers;
mod core;
mod data;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use controllers::{
    Controller, ControllerFn, ControllerRef, DbUpdate, HandlerContext, Inbound, InboundSender,
    Outbound, SendFailure, channel,
};
pub use crate::core::{
    Action, ActionKind, ActionSet, ActionSummary, AppBuilder, AppHandle, DesiredConfigs,
    ManagerConfig, RunningInfo, diff,
};
pub use data::{AppDb, Command, ConfigValue, RouteParams, Topic, UiCommand};
pub use error::{ControllerError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose the built-in tracing subscriber.
// Enabled by default: `--no-default-features` to drop it.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
