//! # Closable inbound channel.
//!
//! Every running controller owns one inbound queue. The same queue doubles as
//! its cancellation signal: closing it is how the engine stops a handler.
//!
//! ```text
//!  Manager ── try_send(Command) ──► [bounded FIFO] ──► Inbound::recv() ──► handler
//!     └────── close() ──────────► CancellationToken ──► recv() yields None
//! ```
//!
//! ## Rules
//! - Commands are delivered in send order (FIFO per topic).
//! - After `close()`, `recv()` returns `None` even if commands are still queued.
//! - `close()` is idempotent and never blocks, also when the handler is gone.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::data::Command;

/// Why a command could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Queue is at capacity.
    Full,
    /// Channel was closed or the handler dropped its end.
    Closed,
}

impl SendFailure {
    /// Stable label used as the `reason` of `CommandDropped` events.
    pub fn as_label(&self) -> &'static str {
        match self {
            SendFailure::Full => "inbound_full",
            SendFailure::Closed => "inbound_closed",
        }
    }
}

/// Creates a fresh inbound channel (capacity clamped to at least 1).
pub fn channel(capacity: usize) -> (InboundSender, Inbound) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closed = CancellationToken::new();
    (
        InboundSender {
            tx,
            closed: closed.clone(),
        },
        Inbound { rx, closed },
    )
}

/// Engine-side end of an inbound channel.
#[derive(Clone, Debug)]
pub struct InboundSender {
    tx: mpsc::Sender<Command>,
    closed: CancellationToken,
}

impl InboundSender {
    /// Queues `cmd` without waiting.
    pub fn try_send(&self, cmd: Command) -> Result<(), SendFailure> {
        if self.closed.is_cancelled() {
            return Err(SendFailure::Closed);
        }
        self.tx.try_send(cmd).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendFailure::Full,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Closes the channel. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// True once closed, or once the handler dropped its [`Inbound`].
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }
}

/// Handler-side end of an inbound channel.
#[derive(Debug)]
pub struct Inbound {
    rx: mpsc::Receiver<Command>,
    closed: CancellationToken,
}

impl Inbound {
    /// Waits for the next command; `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<Command> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            cmd = self.rx.recv() => cmd,
        }
    }

    /// Resolves when the channel is closed.
    ///
    /// Useful to race long-running work against cancellation:
    /// ```no_run
    /// # async fn work() {}
    /// # async fn demo(inbound: routevisor::Inbound) {
    /// tokio::select! {
    ///     _ = inbound.closed() => return,
    ///     _ = work() => {}
    /// }
    /// # }
    /// ```
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn preserves_fifo_order() {
        let (tx, mut rx) = channel(8);
        for i in 0..3 {
            tx.try_send(Command::new("n", json!(i))).unwrap();
        }
        for i in 0..3 {
            assert_eq!(rx.recv().await.unwrap().args, json!(i));
        }
    }

    #[tokio::test]
    async fn close_wins_over_queued_commands() {
        let (tx, mut rx) = channel(8);
        tx.try_send(Command::new("pending", json!(null))).unwrap();
        tx.close();
        assert!(rx.recv().await.is_none());
        assert!(rx.is_closed());
        assert_eq!(tx.try_send(Command::new("late", json!(null))), Err(SendFailure::Closed));
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let (tx, _rx) = channel(0);
        tx.try_send(Command::new("a", json!(null))).unwrap();
        assert_eq!(tx.try_send(Command::new("b", json!(null))), Err(SendFailure::Full));
    }

    #[test]
    fn close_after_receiver_dropped_is_safe() {
        let (tx, rx) = channel(1);
        drop(rx);
        assert!(tx.is_closed());
        tx.close();
        tx.close();
        assert_eq!(tx.try_send(Command::new("x", json!(null))), Err(SendFailure::Closed));
    }
}
