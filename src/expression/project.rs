/*! Projection onto a sub-domain of the source heading. */

use super::{join, rename, restrict, Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink, PIPE_CAPACITY};
use crate::tools::{self, CandKeys};
use crate::tuple::{attribute_map, field_map, project_into, AttributeMap, Zero};
use std::collections::HashSet;
use tracing::debug;

pub(crate) struct Project {
    pub(crate) source: Relation,
    pub(crate) zero: Zero,
    pub(crate) keys: CandKeys,
    map: AttributeMap,
    // Set when no source candidate key survives the projection, which means
    // distinct source tuples can collapse.
    dedup: bool,
    pub(crate) err: ErrorSlot,
}

/// Constructs a projection, rewriting where an identity lets the projection
/// sink closer to the leaves.
pub(crate) fn apply(source: &Relation, zero: Zero) -> Relation {
    let heading = source.heading();
    if zero.heading() == heading {
        return source.clone();
    }
    if !zero.heading().is_sub_domain(&heading) {
        return build(source, zero);
    }
    match source.node() {
        // The outer projection overrides the inner one.
        Node::Project(inner) => return apply(&inner.source, zero),
        Node::Restrict(inner)
            if inner.predicate.domain().heading().is_sub_domain(&zero.heading()) =>
        {
            debug!(shape = %zero.heading(), "pushing projection below restriction");
            return restrict::build(&apply(&inner.source, zero), inner.predicate.clone());
        }
        Node::Rename(inner) => {
            debug!(shape = %zero.heading(), "pushing projection below renaming");
            let fields = zero
                .fields()
                .iter()
                .map(|(attr, value)| {
                    // Every projected attribute names a field of the rename.
                    let pos = inner.zero.position_of(attr).unwrap();
                    (inner.source.zero().fields()[pos].0.clone(), value.clone())
                })
                .collect();
            // A renaming maps distinct names to distinct names.
            let back = Zero::new(fields).unwrap();
            return rename::apply(&apply(&inner.source, back), zero);
        }
        Node::Join(inner) => {
            let left_heading = inner.left.heading();
            let right_heading = inner.right.heading();
            let shared_preserved = attribute_map(&left_heading, &right_heading)
                .iter()
                .all(|pair| zero.position_of(&left_heading.fields()[pair.i].0).is_some());
            if shared_preserved {
                let left_zero = zero.retain(|attr| left_heading.kind_of(attr).is_some());
                let right_zero = zero.retain(|attr| right_heading.kind_of(attr).is_some());
                if left_zero.degree() > 0 && right_zero.degree() > 0 {
                    debug!(shape = %zero.heading(), "distributing projection into join");
                    return join::apply(
                        &apply(&inner.left, left_zero),
                        &apply(&inner.right, right_zero),
                        zero,
                    );
                }
            }
        }
        _ => {}
    }
    build(source, zero)
}

/// Constructs the projection node without rewriting.
pub(crate) fn build(source: &Relation, zero: Zero) -> Relation {
    let heading = source.heading();
    let err = ErrorSlot::new();
    if !zero.heading().is_sub_domain(&heading) {
        err.set(Error::ShapeMismatch {
            context: "projection",
            expected: format!("a sub-domain of {}", heading),
            found: zero.heading().to_string(),
        });
        let keys = tools::default_keys(&zero);
        return Relation::from_node(Node::Project(Project {
            source: source.clone(),
            zero,
            keys,
            map: Vec::new(),
            dedup: false,
            err,
        }));
    }
    // The sub-domain check above makes this infallible.
    let map = field_map(source.zero(), &zero).unwrap();
    let survivors = tools::subset_candidate_keys(source.candidate_keys(), &heading, &map);
    let (keys, dedup) = if survivors.is_empty() {
        (tools::default_keys(&zero), true)
    } else {
        (survivors, false)
    };
    err.adopt(source.err());
    Relation::from_node(Node::Project(Project {
        source: source.clone(),
        zero,
        keys,
        map,
        dedup,
        err,
    }))
}

impl Project {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let (child_sink, receiver) = TupleSink::bounded(self.source.zero().clone(), PIPE_CAPACITY);
        let child_cancel = self.source.stream(child_sink);
        let source = self.source.clone();
        let zero = self.zero.clone();
        let map = self.map.clone();
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
                let out = project_into(&tuple, &zero, &map);
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
    use crate::{keys, tup, zero, Relation};

    fn suppliers() -> Relation {
        Relation::new(
            zero! { SNO: Int, SName: Text, Status: Int, City: Text },
            vec![
                tup!(1, "Smith", 20, "London"),
                tup!(2, "Jones", 10, "Paris"),
                tup!(3, "Blake", 30, "Paris"),
                tup!(4, "Clark", 20, "London"),
                tup!(5, "Adams", 30, "Athens"),
            ],
            keys![[SNO]],
        )
    }

    #[tokio::test]
    async fn test_identity_projection_is_elided() {
        let s = suppliers();
        let p = s.project(zero! { City: Text, SNO: Int, SName: Text, Status: Int });
        assert_eq!("Relation({SNO, SName, Status, City})", p.to_string());
        assert_eq!(5, p.cardinality().await.unwrap());
    }

    #[tokio::test]
    async fn test_collapsing_projection_dedups() {
        let cities = suppliers().project(zero! { City: Text });
        assert_eq!(&keys![[City]], cities.candidate_keys());
        assert_eq!(
            vec![tup!("Athens"), tup!("London"), tup!("Paris")],
            cities.tuples().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_key_preserving_projection() {
        let p = suppliers().project(zero! { SNO: Int, City: Text });
        assert_eq!(&keys![[SNO]], p.candidate_keys());
        assert_eq!(5, p.cardinality().await.unwrap());
    }

    #[test]
    fn test_nested_projections_collapse() {
        let p = suppliers()
            .project(zero! { SNO: Int, SName: Text, City: Text })
            .project(zero! { SNO: Int, City: Text });
        assert_eq!(
            "π{SNO, City}(Relation({SNO, SName, Status, City}))",
            p.to_string()
        );
    }

    #[tokio::test]
    async fn test_non_sub_domain_is_deferred() {
        let p = suppliers().project(zero! { Color: Text });
        assert!(p.err().is_some());
        assert!(p.tuples().await.is_err());
    }
}
