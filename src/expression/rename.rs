/*! Positional attribute relabeling. */

use super::{Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink, PIPE_CAPACITY};
use crate::tools::{self, CandKeys};
use crate::tuple::Zero;

pub(crate) struct Rename {
    pub(crate) source: Relation,
    pub(crate) zero: Zero,
    pub(crate) keys: CandKeys,
    pub(crate) err: ErrorSlot,
}

pub(crate) fn apply(source: &Relation, zero: Zero) -> Relation {
    let src_zero = source.zero();
    let compatible = zero.degree() == src_zero.degree()
        && (0..zero.degree()).all(|pos| zero.kind_at(pos) == src_zero.kind_at(pos));
    if !compatible {
        let err = ErrorSlot::new();
        err.set(Error::ShapeMismatch {
            context: "rename",
            expected: format!("{} fields shaped like {}", src_zero.degree(), src_zero),
            found: zero.to_string(),
        });
        let keys = tools::default_keys(&zero);
        return Relation::from_node(Node::Rename(Rename {
            source: source.clone(),
            zero,
            keys,
            err,
        }));
    }
    // An identity renaming changes nothing.
    if zero == *src_zero {
        return source.clone();
    }
    // Nested renamings collapse: only the outermost names matter.
    if let Node::Rename(inner) = source.node() {
        return apply(&inner.source, zero);
    }
    let keys = tools::rename_candidate_keys(source.candidate_keys(), src_zero, &zero);
    let err = ErrorSlot::new();
    err.adopt(source.err());
    Relation::from_node(Node::Rename(Rename {
        source: source.clone(),
        zero,
        keys,
        err,
    }))
}

impl Rename {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let (child_sink, receiver) = TupleSink::bounded(self.source.zero().clone(), PIPE_CAPACITY);
        let child_cancel = self.source.stream(child_sink);
        let source = self.source.clone();
        let slot = self.err.clone();
        let mut signal = cancel.signal();
        tokio::spawn(async move {
            loop {
                // Values pass through untouched; only the labels differ.
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
                if !sink.send_or_cancel(tuple, &mut signal).await {
                    break;
                }
            }
            child_cancel.cancel();
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::{keys, tup, zero, Relation};

    fn orders() -> Relation {
        Relation::new(
            zero! { PNO: Int, SNO: Int, Qty: Int },
            vec![tup!(1, 1, 300), tup!(1, 2, 200), tup!(2, 1, 300)],
            keys![[PNO, SNO]],
        )
    }

    #[tokio::test]
    async fn test_relabels_positionally() {
        let r = orders().rename(zero! { PartNo: Int, SupplierNo: Int, Quantity: Int });
        assert_eq!(&keys![[PartNo, SupplierNo]], r.candidate_keys());
        assert_eq!(
            vec![tup!(1, 1, 300), tup!(1, 2, 200), tup!(2, 1, 300)],
            r.tuples().await.unwrap()
        );
    }

    #[test]
    fn test_identity_rename_is_elided() {
        let r = orders().rename(zero! { PNO: Int, SNO: Int, Qty: Int });
        assert_eq!("Relation({PNO, SNO, Qty})", r.to_string());
    }

    #[test]
    fn test_nested_renames_collapse() {
        let r = orders()
            .rename(zero! { A: Int, B: Int, C: Int })
            .rename(zero! { X: Int, Y: Int, Z: Int });
        assert_eq!("ρ{X, Y, Z}(Relation({PNO, SNO, Qty}))", r.to_string());
    }

    #[tokio::test]
    async fn test_arity_mismatch_is_deferred() {
        let r = orders().rename(zero! { A: Int, B: Int });
        assert!(r.err().is_some());
        assert!(r.tuples().await.is_err());
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_deferred() {
        let r = orders().rename(zero! { A: Int, B: Text, C: Int });
        assert!(r.err().is_some());
        assert!(r.tuples().await.is_err());
    }
}
