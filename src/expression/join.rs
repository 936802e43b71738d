/*! Natural join.

A nested-loop join over two concurrent input streams. Workers share a pair
of growing memos of the tuples seen so far; a tuple arriving from one side
is appended to its own memo and matched against a snapshot of the opposite
memo, taken under the same lock as the append. That discipline makes every
matching pair observed by exactly one arrival, regardless of interleaving. */

use super::{Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink, PIPE_CAPACITY};
use crate::tools::{self, CandKeys};
use crate::tuple::{attribute_map, combine, partial_equals, AttributeMap, Tuple, Zero};
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) struct Join {
    pub(crate) left: Relation,
    pub(crate) right: Relation,
    pub(crate) zero: Zero,
    pub(crate) keys: CandKeys,
    // Shared attributes of the two inputs, tested for partial equality.
    shared: AttributeMap,
    // Output assembly: output ← left and output ← right.
    left_map: AttributeMap,
    right_map: AttributeMap,
    pub(crate) err: ErrorSlot,
}

struct Memo {
    left: Vec<Arc<Tuple>>,
    right: Vec<Arc<Tuple>>,
}

pub(crate) fn apply(left: &Relation, right: &Relation, zero: Zero) -> Relation {
    let left_heading = left.heading();
    let right_heading = right.heading();
    let err = ErrorSlot::new();

    let kind_clash = left_heading.fields().iter().any(|(attr, kind)| {
        matches!(right_heading.kind_of(attr), Some(other) if other != *kind)
    });
    let mut fields = left.zero().fields().to_vec();
    for (attr, value) in right.zero().fields() {
        if left.zero().position_of(attr).is_none() {
            fields.push((attr.clone(), value.clone()));
        }
    }
    // Names are unique by construction.
    let computed = Zero::new(fields).unwrap();
    if kind_clash || zero.heading() != computed.heading() {
        err.set(Error::ShapeMismatch {
            context: "join shape",
            expected: computed.heading().to_string(),
            found: zero.heading().to_string(),
        });
        return Relation::from_node(Node::Join(Join {
            left: left.clone(),
            right: right.clone(),
            keys: tools::default_keys(&zero),
            zero,
            shared: Vec::new(),
            left_map: Vec::new(),
            right_map: Vec::new(),
            err,
        }));
    }

    let shared = attribute_map(&left_heading, &right_heading);
    let out_heading = zero.heading();
    let left_map = attribute_map(&out_heading, &left_heading);
    let right_map = attribute_map(&out_heading, &right_heading);
    let keys = tools::join_candidate_keys(left.candidate_keys(), right.candidate_keys());
    err.adopt(left.err());
    err.adopt(right.err());
    Relation::from_node(Node::Join(Join {
        left: left.clone(),
        right: right.clone(),
        zero,
        keys,
        shared,
        left_map,
        right_map,
        err,
    }))
}

impl Join {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let (left_sink, left_rx) = TupleSink::bounded(self.left.zero().clone(), PIPE_CAPACITY);
        let (right_sink, right_rx) = TupleSink::bounded(self.right.zero().clone(), PIPE_CAPACITY);
        let left_cancel = Arc::new(self.left.stream(left_sink));
        let right_cancel = Arc::new(self.right.stream(right_sink));
        let memo = Arc::new(Mutex::new(Memo {
            left: Vec::new(),
            right: Vec::new(),
        }));

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let left_rx = left_rx.clone();
            let right_rx = right_rx.clone();
            let left_cancel = left_cancel.clone();
            let right_cancel = right_cancel.clone();
            let memo = memo.clone();
            let sink = sink.clone();
            let zero = self.zero.clone();
            let shared = self.shared.clone();
            let left_map = self.left_map.clone();
            let right_map = self.right_map.clone();
            let mut signal = cancel.signal();
            handles.push(tokio::spawn(async move {
                let mut left_open = true;
                let mut right_open = true;
                while left_open || right_open {
                    tokio::select! {
                        _ = signal.cancelled() => {
                            left_cancel.cancel();
                            right_cancel.cancel();
                            return;
                        }
                        received = left_rx.recv(), if left_open => match received {
                            Err(_) => left_open = false,
                            Ok(tuple) => {
                                let tuple = Arc::new(tuple);
                                let snapshot = {
                                    let mut memo = memo.lock();
                                    memo.left.push(tuple.clone());
                                    memo.right.clone()
                                };
                                for other in &snapshot {
                                    if !partial_equals(tuple.as_ref(), other.as_ref(), &shared) {
                                        continue;
                                    }
                                    let mut out = zero.blank();
                                    combine(&mut out, tuple.as_ref(), &left_map);
                                    combine(&mut out, other.as_ref(), &right_map);
                                    if !sink.send_or_cancel(out, &mut signal).await {
                                        left_cancel.cancel();
                                        right_cancel.cancel();
                                        return;
                                    }
                                }
                            }
                        },
                        received = right_rx.recv(), if right_open => match received {
                            Err(_) => right_open = false,
                            Ok(tuple) => {
                                let tuple = Arc::new(tuple);
                                let snapshot = {
                                    let mut memo = memo.lock();
                                    memo.right.push(tuple.clone());
                                    memo.left.clone()
                                };
                                for other in &snapshot {
                                    if !partial_equals(other.as_ref(), tuple.as_ref(), &shared) {
                                        continue;
                                    }
                                    let mut out = zero.blank();
                                    combine(&mut out, other.as_ref(), &left_map);
                                    combine(&mut out, tuple.as_ref(), &right_map);
                                    if !sink.send_or_cancel(out, &mut signal).await {
                                        left_cancel.cancel();
                                        right_cancel.cancel();
                                        return;
                                    }
                                }
                            }
                        },
                    }
                }
            }));
        }
        drop(sink);

        let left = self.left.clone();
        let right = self.right.clone();
        let slot = self.err.clone();
        let signal = cancel.signal();
        tokio::spawn(async move {
            let mut worker_panicked = false;
            for handle in handles {
                if let Err(err) = handle.await {
                    worker_panicked = worker_panicked || err.is_panic();
                }
            }
            if worker_panicked {
                // A dead worker may leave the children blocked on sends
                // nobody will drain.
                slot.set(Error::Source("join worker panicked".into()));
                left_cancel.cancel();
                right_cancel.cancel();
                return;
            }
            if signal.is_cancelled() {
                left_cancel.cancel();
                right_cancel.cancel();
                return;
            }
            slot.adopt(left.err());
            slot.adopt(right.err());
        });
    }
}
