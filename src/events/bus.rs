//! # Event bus.
//!
//! [`Bus`] is the one place every runtime fact goes through. The manager, the
//! lifecycle orchestrator and every handler task publish into it; the
//! subscriber listener and any host receiver from
//! [`AppHandle::events`](crate::AppHandle::events) read from it.
//!
//! ```text
//!   Manager ─────┐
//!   Lifecycle ───┼──► Bus (broadcast) ──┬──► subscriber listener ──► SubscriberSet
//!   handler(s) ──┘                      └──► AppHandle::events()
//! ```
//!
//! Publishing never blocks and never fails. Receivers that fall more than
//! `capacity` events behind see `RecvError::Lagged(n)` and lose the oldest
//! `n`. Nothing is stored for receivers that subscribe later.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Clones share the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Bus retaining up to `capacity` events for lagging receivers (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes `ev`; dropped silently when nobody listens.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
