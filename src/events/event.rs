//! # Runtime events emitted by the manager and controller handlers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Reconciliation events**: route received, reconcile pass finished
//! - **Lifecycle events**: controller started/stopped, route forwarded
//! - **Fault events**: params/start/stop/handler failures, dropped commands
//! - **Runtime events**: shutdown, subscriber overflow/panic
//!
//! The [`Event`] struct carries additional metadata such as timestamps, topic,
//! reasons and run counters.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use routevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::StartFailed)
//!     .with_topic("news")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::StartFailed);
//! assert_eq!(ev.topic.as_deref(), Some("news"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Reconciliation ===
    /// A route change arrived and a reconcile pass begins.
    RouteReceived,

    /// Every action of a reconcile pass has been applied.
    ///
    /// Sets: `reason` (compact action summary, e.g. `start=1 stop=0 restart=1 route_changed=2`).
    ReconcileFinished,

    // === Lifecycle ===
    /// Controller started and its handler task was spawned.
    ///
    /// Sets: `topic`, `runs` (total starts for this topic).
    ControllerStarted,

    /// Controller stopped; its registry entry was removed and its channel closed.
    ///
    /// Sets: `topic`.
    ControllerStopped,

    /// Synthetic `route-changed` command forwarded to a running controller.
    ///
    /// Sets: `topic`.
    RouteForwarded,

    // === Faults ===
    /// `params` failed; the topic is left untouched for this pass.
    ///
    /// Sets: `topic`, `reason`.
    ParamsFailed,

    /// `start` failed; no registry entry was created.
    ///
    /// Sets: `topic`, `reason`.
    StartFailed,

    /// `stop` failed; the registry entry was removed anyway.
    ///
    /// Sets: `topic`, `reason`.
    StopFailed,

    /// Handler task returned on its own (channel closed or work finished).
    ///
    /// Sets: `topic`.
    HandlerExited,

    /// Handler task returned an error.
    ///
    /// Sets: `topic`, `reason`.
    HandlerFailed,

    /// Handler task panicked.
    ///
    /// Sets: `topic`, `reason` (panic payload if it is a string).
    HandlerPanicked,

    /// Handler task did not exit within the stop grace and was aborted.
    ///
    /// Sets: `topic`, `timeout_ms`.
    StopGraceExceeded,

    /// A submitted db update panicked; the db was left as it was.
    ///
    /// Sets: `topic` (submitting controller, absent for host updates), `reason`.
    UpdatePanicked,

    /// A command could not be delivered.
    ///
    /// Sets: `topic`, `command`, `reason` (`not_running`, `inbound_full`, `inbound_closed`).
    CommandDropped,

    // === Runtime ===
    /// Host asked the manager to stop.
    ShutdownRequested,

    /// Manager loop finished: all controllers stopped and sources released.
    ManagerStopped,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `topic` (subscriber name), `reason`.
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `topic` (subscriber name), `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Topic of the controller involved, if any.
    pub topic: Option<Arc<str>>,
    /// Human-readable reason (errors, summaries, drop causes).
    pub reason: Option<Arc<str>>,
    /// Name of the command involved, if any.
    pub command: Option<Arc<str>>,
    /// Total number of starts for `topic`.
    pub runs: Option<u64>,
    /// Grace that was exceeded, in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            topic: None,
            reason: None,
            command: None,
            runs: None,
            timeout_ms: None,
        }
    }

    /// Attaches a topic.
    #[inline]
    pub fn with_topic(mut self, topic: impl Into<Arc<str>>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a command name.
    #[inline]
    pub fn with_command(mut self, command: impl Into<Arc<str>>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Attaches the run counter.
    #[inline]
    pub fn with_runs(mut self, runs: u64) -> Self {
        self.runs = Some(runs);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_topic(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_topic(subscriber)
            .with_reason(info)
    }

    /// Creates a dropped-command event.
    #[inline]
    pub fn command_dropped(topic: &str, command: &str, reason: &'static str) -> Self {
        Event::new(EventKind::CommandDropped)
            .with_topic(topic)
            .with_command(command)
            .with_reason(reason)
    }

    /// True for kinds that report a fault to the host.
    pub fn is_fault(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ParamsFailed
                | EventKind::StartFailed
                | EventKind::StopFailed
                | EventKind::HandlerFailed
                | EventKind::HandlerPanicked
                | EventKind::UpdatePanicked
                | EventKind::StopGraceExceeded
        )
    }
}
