//! # LogWriter: tracing-backed event writer
//!
//! A subscriber that renders incoming [`Event`]s through `tracing`. Faults are
//! logged at `warn`, lifecycle transitions at `info`, chatty events at `debug`.
//!
//! ## Example output
//! ```text
//! INFO routevisor: controller started topic="news" runs=1
//! WARN routevisor: start failed topic="image_gallery" reason="boom"
//! DEBUG routevisor: command dropped topic="users" command="reload" reason="not_running"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let topic = e.topic.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::RouteReceived => {
                tracing::debug!(target: "routevisor", "route received");
            }
            EventKind::ReconcileFinished => {
                tracing::info!(target: "routevisor", actions = reason, "reconcile finished");
            }
            EventKind::ControllerStarted => {
                tracing::info!(target: "routevisor", topic, runs = e.runs, "controller started");
            }
            EventKind::ControllerStopped => {
                tracing::info!(target: "routevisor", topic, "controller stopped");
            }
            EventKind::RouteForwarded => {
                tracing::debug!(target: "routevisor", topic, "route-changed forwarded");
            }
            EventKind::HandlerExited => {
                tracing::debug!(target: "routevisor", topic, "handler exited");
            }
            EventKind::CommandDropped => {
                tracing::debug!(
                    target: "routevisor",
                    topic,
                    command = e.command.as_deref().unwrap_or("-"),
                    reason,
                    "command dropped"
                );
            }
            EventKind::ParamsFailed => {
                tracing::warn!(target: "routevisor", topic, reason, "params failed");
            }
            EventKind::StartFailed => {
                tracing::warn!(target: "routevisor", topic, reason, "start failed");
            }
            EventKind::StopFailed => {
                tracing::warn!(target: "routevisor", topic, reason, "stop failed");
            }
            EventKind::HandlerFailed => {
                tracing::warn!(target: "routevisor", topic, reason, "handler failed");
            }
            EventKind::HandlerPanicked => {
                tracing::warn!(target: "routevisor", topic, reason, "handler panicked");
            }
            EventKind::UpdatePanicked => {
                tracing::warn!(target: "routevisor", topic, reason, "db update panicked");
            }
            EventKind::StopGraceExceeded => {
                tracing::warn!(
                    target: "routevisor",
                    topic,
                    grace_ms = e.timeout_ms,
                    "handler aborted after grace"
                );
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "routevisor", "shutdown requested");
            }
            EventKind::ManagerStopped => {
                tracing::info!(target: "routevisor", "manager stopped");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(
                    target: "routevisor",
                    subscriber = topic,
                    reason,
                    kind = ?e.kind,
                    "subscriber fault"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
