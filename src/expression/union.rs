/*! Set union of two relations with equal headings. */

use super::{Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink, PIPE_CAPACITY};
use crate::tools::{self, CandKeys};
use crate::tuple::{field_map, project_into, AttributeMap, Zero};
use std::collections::HashSet;

pub(crate) struct Union {
    pub(crate) left: Relation,
    pub(crate) right: Relation,
    pub(crate) zero: Zero,
    pub(crate) keys: CandKeys,
    // Re-aligns right-hand tuples onto the output shape, which is the left
    // input's shape.
    right_map: AttributeMap,
    pub(crate) err: ErrorSlot,
}

pub(crate) fn apply(left: &Relation, right: &Relation) -> Relation {
    let zero = left.zero().clone();
    let err = ErrorSlot::new();
    if left.heading() != right.heading() {
        err.set(Error::ShapeMismatch {
            context: "union",
            expected: left.heading().to_string(),
            found: right.heading().to_string(),
        });
        return Relation::from_node(Node::Union(Union {
            left: left.clone(),
            right: right.clone(),
            keys: tools::default_keys(&zero),
            zero,
            right_map: Vec::new(),
            err,
        }));
    }
    // Equal headings make this infallible.
    let right_map = field_map(right.zero(), &zero).unwrap();
    let mut keys = tools::intersect_candidate_keys(left.candidate_keys(), right.candidate_keys());
    if keys.is_empty() {
        keys = tools::default_keys(&zero);
    }
    err.adopt(left.err());
    err.adopt(right.err());
    Relation::from_node(Node::Union(Union {
        left: left.clone(),
        right: right.clone(),
        zero,
        keys,
        right_map,
        err,
    }))
}

impl Union {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let (left_sink, left_rx) = TupleSink::bounded(self.left.zero().clone(), PIPE_CAPACITY);
        let (right_sink, right_rx) = TupleSink::bounded(self.right.zero().clone(), PIPE_CAPACITY);
        let left_cancel = self.left.stream(left_sink);
        let right_cancel = self.right.stream(right_sink);
        let left = self.left.clone();
        let right = self.right.clone();
        let zero = self.zero.clone();
        let right_map = self.right_map.clone();
        let slot = self.err.clone();
        let mut signal = cancel.signal();
        tokio::spawn(async move {
            let mut seen: HashSet<_> = HashSet::new();
            let mut left_open = true;
            let mut right_open = true;
            let mut stopped = false;
            while (left_open || right_open) && !stopped {
                let tuple = tokio::select! {
                    _ = signal.cancelled() => {
                        stopped = true;
                        continue;
                    }
                    received = left_rx.recv(), if left_open => match received {
                        Ok(tuple) => tuple,
                        Err(_) => {
                            left_open = false;
                            continue;
                        }
                    },
                    received = right_rx.recv(), if right_open => match received {
                        Ok(tuple) => project_into(&tuple, &zero, &right_map),
                        Err(_) => {
                            right_open = false;
                            continue;
                        }
                    },
                };
                if !seen.insert(tuple.clone()) {
                    continue;
                }
                if !sink.send_or_cancel(tuple, &mut signal).await {
                    stopped = true;
                }
            }
            if stopped {
                left_cancel.cancel();
                right_cancel.cancel();
                return;
            }
            slot.adopt(left.err());
            slot.adopt(right.err());
        });
    }
}
