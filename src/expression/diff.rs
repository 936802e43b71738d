/*! Set difference of two relations with equal headings.

The right side is materialized into a value set before anything is emitted,
so it must be finite. */

use super::{Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink, PIPE_CAPACITY};
use crate::tools::{self, CandKeys};
use crate::tuple::{field_map, project_into, AttributeMap, Zero};
use std::collections::HashSet;

pub(crate) struct Diff {
    pub(crate) left: Relation,
    pub(crate) right: Relation,
    pub(crate) zero: Zero,
    pub(crate) keys: CandKeys,
    right_map: AttributeMap,
    pub(crate) err: ErrorSlot,
}

pub(crate) fn apply(left: &Relation, right: &Relation) -> Relation {
    let zero = left.zero().clone();
    let err = ErrorSlot::new();
    if left.heading() != right.heading() {
        err.set(Error::ShapeMismatch {
            context: "difference",
            expected: left.heading().to_string(),
            found: right.heading().to_string(),
        });
        return Relation::from_node(Node::Diff(Diff {
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
    err.adopt(left.err());
    err.adopt(right.err());
    Relation::from_node(Node::Diff(Diff {
        left: left.clone(),
        right: right.clone(),
        zero,
        keys: left.candidate_keys().clone(),
        right_map,
        err,
    }))
}

impl Diff {
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
            let mut excluded: HashSet<_> = HashSet::new();
            let mut stopped = false;
            loop {
                tokio::select! {
                    _ = signal.cancelled() => {
                        stopped = true;
                        break;
                    }
                    received = right_rx.recv() => match received {
                        Ok(tuple) => {
                            excluded.insert(project_into(&tuple, &zero, &right_map));
                        }
                        Err(_) => break,
                    },
                }
            }
            while !stopped {
                let tuple = tokio::select! {
                    _ = signal.cancelled() => {
                        stopped = true;
                        continue;
                    }
                    received = left_rx.recv() => match received {
                        Ok(tuple) => tuple,
                        Err(_) => break,
                    },
                };
                if excluded.contains(&tuple) {
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

#[cfg(test)]
mod tests {
    use crate::{keys, tup, zero, Relation};

    fn cities(rows: Vec<crate::Tuple>) -> Relation {
        Relation::new(zero! { City: Text }, rows, keys![])
    }

    #[tokio::test]
    async fn test_difference() {
        let a = cities(vec![tup!("London"), tup!("Paris"), tup!("Athens")]);
        let b = cities(vec![tup!("London"), tup!("Paris"), tup!("Oslo")]);
        assert_eq!(vec![tup!("Athens")], a.diff(&b).tuples().await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_subtrahend_is_identity() {
        let a = cities(vec![tup!("London"), tup!("Paris")]);
        let none = cities(vec![]);
        assert_eq!(a.tuples().await.unwrap(), a.diff(&none).tuples().await.unwrap());
    }

    #[test]
    fn test_keys_follow_the_left_input() {
        let a = Relation::new(zero! { A: Int, B: Int }, vec![], keys![[A]]);
        let b = Relation::new(zero! { A: Int, B: Int }, vec![], keys![[B]]);
        assert_eq!(&keys![[A]], a.diff(&b).candidate_keys());
    }

    #[tokio::test]
    async fn test_realigns_permuted_headings() {
        let a = Relation::new(
            zero! { A: Int, B: Text },
            vec![tup!(1, "x"), tup!(2, "y")],
            keys![],
        );
        let b = Relation::new(zero! { B: Text, A: Int }, vec![tup!("y", 2)], keys![]);
        assert_eq!(vec![tup!(1, "x")], a.diff(&b).tuples().await.unwrap());
    }

    #[tokio::test]
    async fn test_unequal_headings_are_deferred() {
        let a = cities(vec![tup!("London")]);
        let b = Relation::new(zero! { Town: Text }, vec![], keys![]);
        assert!(a.diff(&b).tuples().await.is_err());
    }
}
