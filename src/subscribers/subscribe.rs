//! # Subscriber trait
//!
//! Implement [`Subscribe`] to observe what the engine does: controllers coming
//! and going, dropped commands, faults. Each subscriber gets its own worker and
//! bounded queue inside the [`SubscriberSet`](crate::SubscriberSet), so a slow
//! one never holds up the manager loop or its peers.
//!
//! Overflowing queues drop events for that subscriber only and publish
//! `SubscriberOverflow`.

use async_trait::async_trait;

use crate::events::Event;

/// Event observer.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes one event on the subscriber's worker task.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue size for this subscriber (clamped to at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }

    /// Whether `event` should be queued for this subscriber at all.
    ///
    /// Evaluated on the emitting side, so rejected events never take queue space.
    fn accepts(&self, _event: &Event) -> bool {
        true
    }
}
