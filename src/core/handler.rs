//! # Handler task: one per running controller.
//!
//! Spawns [`Controller::handle`](crate::Controller::handle) as an isolated task
//! and reports how it ended.
//!
//! ## Event flow
//! ```text
//! handle() ─► Ok(()) / Err(Closed) ─► HandlerExited
//!          ─► Err(other)           ─► HandlerFailed
//!          ─► panic                ─► HandlerPanicked
//! ```
//!
//! ## Rules
//! - A fault never reaches the manager loop or other handlers.
//! - The task never touches the registry; a dead handler leaves its entry in
//!   place until the topic is stopped.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::controllers::{ControllerRef, HandlerContext};
use crate::error::{ControllerError, panic_message};
use crate::events::{Bus, Event, EventKind};

/// Spawns the handler of `controller` bound to `ctx`.
pub(crate) fn spawn_handler(
    controller: ControllerRef,
    ctx: HandlerContext,
    bus: Bus,
) -> JoinHandle<()> {
    let topic = ctx.topic.clone();
    tokio::spawn(async move {
        let res = AssertUnwindSafe(controller.handle(ctx)).catch_unwind().await;
        let ev = match res {
            Ok(Ok(())) | Ok(Err(ControllerError::Closed)) => Event::new(EventKind::HandlerExited),
            Ok(Err(e)) => {
                tracing::debug!(topic = &*topic, error = %e, "handler failed");
                Event::new(EventKind::HandlerFailed).with_reason(e.to_string())
            }
            Err(panic) => {
                let info = panic_message(&*panic);
                tracing::debug!(topic = &*topic, %info, "handler panicked");
                Event::new(EventKind::HandlerPanicked).with_reason(info)
            }
        };
        bus.publish(ev.with_topic(topic));
    })
}

/// Runs a synchronous controller capability, turning a panic into a [`ControllerError`].
pub(crate) fn guarded<T>(
    f: impl FnOnce() -> Result<T, ControllerError>,
) -> Result<T, ControllerError> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(panic) => Err(ControllerError::failed(format!(
            "panicked: {}",
            panic_message(&*panic)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::{mpsc, watch};

    use crate::controllers::{ControllerFn, Outbound, channel};
    use crate::data::AppDb;

    fn context(topic: &str) -> (crate::controllers::InboundSender, HandlerContext) {
        let (tx, inbound) = channel(4);
        let (mtx, _mrx) = mpsc::unbounded_channel();
        let (_db_tx, db_rx) = watch::channel(Arc::new(AppDb::new()));
        let ctx = HandlerContext::new(
            topic.into(),
            json!(null),
            inbound,
            Outbound::new(topic.into(), mtx),
            db_rx,
        );
        (tx, ctx)
    }

    async fn outcome(controller: ControllerRef, close: bool) -> Event {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let (tx, ctx) = context("t");
        let join = spawn_handler(controller, ctx, bus);
        if close {
            tx.close();
        }
        join.await.unwrap();
        rx.recv().await.unwrap()
    }

    #[tokio::test]
    async fn closing_inbound_ends_default_handler() {
        let ev = outcome(ControllerFn::always(json!(1)).arc(), true).await;
        assert_eq!(ev.kind, EventKind::HandlerExited);
        assert_eq!(ev.topic.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn handler_error_is_reported() {
        let c = ControllerFn::always(json!(1))
            .on_handle(|_ctx| async { Err::<(), _>(ControllerError::failed("db down")) })
            .arc();
        let ev = outcome(c, false).await;
        assert_eq!(ev.kind, EventKind::HandlerFailed);
        assert!(ev.reason.as_deref().unwrap().contains("db down"));
    }

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let c = ControllerFn::always(json!(1))
            .on_handle(|_ctx| async {
                if true {
                    panic!("kaboom");
                }
                Ok::<(), ControllerError>(())
            })
            .arc();
        let ev = outcome(c, false).await;
        assert_eq!(ev.kind, EventKind::HandlerPanicked);
        assert_eq!(ev.reason.as_deref(), Some("kaboom"));
    }

    #[test]
    fn guarded_converts_panics() {
        let res: Result<(), _> = guarded(|| panic!("in start"));
        assert_eq!(res, Err(ControllerError::failed("panicked: in start")));
        assert_eq!(guarded(|| Ok(3)), Ok(3));
    }
}
