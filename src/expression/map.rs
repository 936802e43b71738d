/*! One-to-one transformation by an opaque user function. */

use super::{Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink, PIPE_CAPACITY};
use crate::tools::{self, CandKeys};
use crate::tuple::{Tuple, Zero};
use std::collections::HashSet;
use std::sync::Arc;

pub(crate) type Transform = Arc<dyn Fn(&Tuple) -> Tuple + Send + Sync>;

pub(crate) struct MapExpr {
    pub(crate) source: Relation,
    pub(crate) zero: Zero,
    pub(crate) keys: CandKeys,
    // Without declared keys the function can collapse distinct inputs.
    dedup: bool,
    transform: Transform,
    pub(crate) err: ErrorSlot,
}

pub(crate) fn apply(source: &Relation, zero: Zero, mut keys: CandKeys, transform: Transform) -> Relation {
    let err = ErrorSlot::new();
    if !tools::keys_within(&keys, &zero.heading()) {
        err.set(Error::ShapeMismatch {
            context: "candidate keys",
            expected: zero.to_string(),
            found: "a key attribute outside the heading".into(),
        });
    }
    let dedup = keys.is_empty();
    if dedup {
        keys = tools::default_keys(&zero);
    } else {
        tools::order_candidate_keys(&mut keys);
    }
    err.adopt(source.err());
    Relation::from_node(Node::Map(MapExpr {
        source: source.clone(),
        zero,
        keys,
        dedup,
        transform,
        err,
    }))
}

impl MapExpr {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let (child_sink, receiver) = TupleSink::bounded(self.source.zero().clone(), PIPE_CAPACITY);
        let child_cancel = self.source.stream(child_sink);
        let source = self.source.clone();
        let zero = self.zero.clone();
        let transform = self.transform.clone();
        let dedup = self.dedup;
        let slot = self.err.clone();
        let mut signal = cancel.signal();
        tokio::spawn(async move {
            let mut seen = dedup.then(HashSet::new);
            loop {
                let tuple = tokio::select! {
                    _ = signal.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(tuple) => tuple,
                        Err(_) => {
                            slot.adopt(source.err());
                            return;
                        }
                    },
                };
                let out = (transform)(&tuple);
                if !zero.admits(&out) {
                    slot.set(Error::ShapeMismatch {
                        context: "map output",
                        expected: zero.to_string(),
                        found: out.to_string(),
                    });
                    break;
                }
                if let Some(seen) = seen.as_mut() {
                    if !seen.insert(out.clone()) {
                        continue;
                    }
                }
                if !sink.send_or_cancel(out, &mut signal).await {
                    break;
                }
            }
            child_cancel.cancel();
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::{keys, tup, zero, Relation, Tuple, Value};

    fn orders() -> Relation {
        Relation::new(
            zero! { PNO: Int, Qty: Int },
            vec![tup!(1, 300), tup!(2, 200), tup!(3, 300)],
            keys![[PNO]],
        )
    }

    fn double_qty(t: &Tuple) -> Tuple {
        Tuple::from(vec![
            t.get(0).clone(),
            Value::Int(t.get(1).as_int().unwrap() * 2),
        ])
    }

    #[tokio::test]
    async fn test_transforms_each_tuple() {
        let doubled = orders().map(zero! { PNO: Int, Qty: Int }, keys![[PNO]], double_qty);
        assert_eq!(
            vec![tup!(1, 600), tup!(2, 400), tup!(3, 600)],
            doubled.tuples().await.unwrap()
        );
        assert_eq!(&keys![[PNO]], doubled.candidate_keys());
    }

    #[tokio::test]
    async fn test_keyless_map_dedups() {
        let quantities = orders().map(zero! { Qty: Int }, keys![], |t| {
            Tuple::from(vec![t.get(1).clone()])
        });
        assert_eq!(&keys![[Qty]], quantities.candidate_keys());
        assert_eq!(vec![tup!(200), tup!(300)], quantities.tuples().await.unwrap());
    }

    #[tokio::test]
    async fn test_misshapen_output_is_deferred() {
        let bad = orders().map(zero! { PNO: Int }, keys![], |_| tup!("oops"));
        assert!(bad.tuples().await.is_err());
        assert!(bad.err().is_some());
    }

    #[tokio::test]
    async fn test_foreign_key_attribute_is_deferred() {
        let bad = orders().map(zero! { PNO: Int }, keys![[Qty]], |t| {
            Tuple::from(vec![t.get(0).clone()])
        });
        assert!(bad.err().is_some());
        assert!(bad.tuples().await.is_err());
    }
}
