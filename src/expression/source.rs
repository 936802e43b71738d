/*! The stream literal: a leaf relation over an external lazy sequence.

Anything that can feed a channel of tuples can back a relation this way;
adapters for files, databases, and collections live outside this crate. */

use super::{Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink};
use crate::tools::{self, CandKeys};
use crate::tuple::{Tuple, Zero};
use parking_lot::Mutex;
use std::collections::HashSet;

pub(crate) struct Source {
    pub(crate) zero: Zero,
    receiver: Mutex<Option<async_channel::Receiver<Tuple>>>,
    pub(crate) keys: CandKeys,
    source_distinct: bool,
    pub(crate) err: ErrorSlot,
}

pub(crate) fn build(
    zero: Zero,
    receiver: async_channel::Receiver<Tuple>,
    mut keys: CandKeys,
    source_distinct: bool,
) -> Relation {
    let err = ErrorSlot::new();
    if !tools::keys_within(&keys, &zero.heading()) {
        err.set(Error::ShapeMismatch {
            context: "candidate keys",
            expected: zero.to_string(),
            found: "a key attribute outside the heading".into(),
        });
    }
    if keys.is_empty() {
        keys = tools::default_keys(&zero);
    } else {
        tools::order_candidate_keys(&mut keys);
    }
    Relation::from_node(Node::Source(Source {
        zero,
        receiver: Mutex::new(Some(receiver)),
        keys,
        source_distinct,
        err,
    }))
}

impl Source {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let receiver = self.receiver.lock().take();
        let Some(receiver) = receiver else {
            self.err.set(Error::Source("stream source already consumed".into()));
            return;
        };
        let zero = self.zero.clone();
        let source_distinct = self.source_distinct;
        let slot = self.err.clone();
        let mut signal = cancel.signal();
        tokio::spawn(async move {
            let mut seen = if source_distinct {
                None
            } else {
                Some(HashSet::new())
            };
            loop {
                let tuple = tokio::select! {
                    _ = signal.cancelled() => return,
                    received = receiver.recv() => match received {
                        Ok(tuple) => tuple,
                        Err(_) => return,
                    },
                };
                if !zero.admits(&tuple) {
                    slot.set(Error::ShapeMismatch {
                        context: "stream source",
                        expected: zero.to_string(),
                        found: tuple.to_string(),
                    });
                    return;
                }
                if let Some(seen) = seen.as_mut() {
                    if !seen.insert(tuple.clone()) {
                        continue;
                    }
                }
                if !sink.send_or_cancel(tuple, &mut signal).await {
                    return;
                }
            }
        });
    }
}
