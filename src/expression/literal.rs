/*! The slice literal: a leaf relation over materialized tuples. */

use super::{Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink};
use crate::tools::{self, CandKeys};
use crate::tuple::{Tuple, Zero};
use std::sync::Arc;

pub(crate) struct Literal {
    pub(crate) zero: Zero,
    pub(crate) tuples: Arc<Vec<Tuple>>,
    pub(crate) keys: CandKeys,
    pub(crate) err: ErrorSlot,
}

pub(crate) fn build(zero: Zero, mut tuples: Vec<Tuple>, mut keys: CandKeys) -> Relation {
    let err = ErrorSlot::new();
    if let Some(bad) = tuples.iter().find(|tuple| !zero.admits(tuple)) {
        err.set(Error::ShapeMismatch {
            context: "literal tuple",
            expected: zero.to_string(),
            found: bad.to_string(),
        });
    } else if !tools::keys_within(&keys, &zero.heading()) {
        err.set(Error::ShapeMismatch {
            context: "candidate keys",
            expected: zero.to_string(),
            found: "a key attribute outside the heading".into(),
        });
    }
    if keys.is_empty() {
        // No key claimed, so the data cannot be trusted distinct.
        tuples.sort_unstable();
        tuples.dedup();
        keys = tools::default_keys(&zero);
    } else {
        tools::order_candidate_keys(&mut keys);
    }
    Relation::from_node(Node::Literal(Literal {
        zero,
        tuples: Arc::new(tuples),
        keys,
        err,
    }))
}

impl Literal {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let tuples = self.tuples.clone();
        let mut signal = cancel.signal();
        tokio::spawn(async move {
            for tuple in tuples.iter() {
                if !sink.send_or_cancel(tuple.clone(), &mut signal).await {
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::{keys, tup, zero, Relation, Tuple};

    #[test]
    fn test_default_key_is_all_attributes() {
        let r = Relation::new(zero! { A: Int, B: Text }, vec![], keys![]);
        assert_eq!(&keys![[A, B]], r.candidate_keys());
    }

    #[tokio::test]
    async fn test_eager_dedup_without_keys() {
        let r = Relation::new(
            zero! { A: Int },
            vec![tup!(2), tup!(1), tup!(2), tup!(1)],
            keys![],
        );
        assert_eq!(vec![tup!(1), tup!(2)], r.tuples().await.unwrap());
    }

    #[tokio::test]
    async fn test_keyed_data_is_trusted() {
        let r = Relation::new(
            zero! { A: Int, B: Text },
            vec![tup!(1, "x"), tup!(2, "y")],
            keys![[A]],
        );
        assert_eq!(&keys![[A]], r.candidate_keys());
        assert_eq!(2, r.cardinality().await.unwrap());
        assert!(r.err().is_none());
    }

    #[tokio::test]
    async fn test_mistyped_tuple_is_deferred() {
        let r = Relation::new(zero! { A: Int }, vec![tup!("oops")], keys![]);
        assert!(r.tuples().await.is_err());
        assert!(r.err().is_some());
    }

    #[tokio::test]
    async fn test_foreign_key_attribute_is_deferred() {
        let r = Relation::new(zero! { A: Int }, vec![tup!(1)], keys![[B]]);
        assert!(r.err().is_some());
        assert!(r.tuples().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_body() {
        let r = Relation::new(zero! { A: Int }, vec![], keys![[A]]);
        assert_eq!(Vec::<Tuple>::new(), r.tuples().await.unwrap());
    }
}
