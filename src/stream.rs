/*! Tuple pipes and stream cancellation.

A relation streams its body into a [`TupleSink`]: a bounded channel tagged
with the tuple shape the receiver expects. Every `stream` invocation returns
a [`Cancel`] handle; closing it makes every task in the expression subtree
exit at its next suspension point. */

use crate::tuple::{Tuple, Zero};
use tokio::sync::watch;

/// Capacity of the internal operator-to-operator pipes.
pub(crate) const PIPE_CAPACITY: usize = 1;

/// A typed destination for a relation's tuple stream.
///
/// The sink's shape must equal the relation's zero attribute-for-attribute
/// in declared order; a mismatch is a deferred shape error and the stream
/// never starts.
#[derive(Clone)]
pub struct TupleSink {
    zero: Zero,
    tx: async_channel::Sender<Tuple>,
}

impl TupleSink {
    /// Creates a sink of the given shape over a bounded channel and returns
    /// the receiving end. Capacity is clamped to at least one.
    pub fn bounded(zero: Zero, capacity: usize) -> (TupleSink, async_channel::Receiver<Tuple>) {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        (TupleSink { zero, tx }, rx)
    }

    pub fn zero(&self) -> &Zero {
        &self.zero
    }

    /// Sends a tuple, giving up if cancellation fires first or the receiving
    /// end is gone. Returns false when the stream should wind down.
    pub(crate) async fn send_or_cancel(&self, tuple: Tuple, cancel: &mut CancelSignal) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            sent = self.tx.send(tuple) => sent.is_ok(),
        }
    }
}

/// Cancels a running stream.
///
/// Returned by [`Relation::stream`]; each operator also holds the handles of
/// its child streams and closes them when its own stream is cancelled.
///
/// [`Relation::stream`]: crate::Relation::stream
#[derive(Debug)]
pub struct Cancel {
    tx: watch::Sender<bool>,
}

impl Cancel {
    pub(crate) fn new() -> Cancel {
        let (tx, _rx) = watch::channel(false);
        Cancel { tx }
    }

    /// Signals every task of the stream to stop. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// The task-side view of a [`Cancel`] handle.
#[derive(Clone, Debug)]
pub(crate) struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Resolves once the stream is cancelled. If the handle was dropped
    /// without cancelling, nothing can cancel the stream anymore and this
    /// never resolves.
    pub(crate) async fn cancelled(&mut self) {
        if self.rx.wait_for(|&cancelled| cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}
