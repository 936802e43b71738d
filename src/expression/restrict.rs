/*! Restriction by a predicate over a sub-domain of the source heading. */

use super::{diff, groupby, join, project, rename, union, Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::predicate::Predicate;
use crate::stream::{Cancel, TupleSink, PIPE_CAPACITY};
use crate::tools::CandKeys;
use crate::tuple::{field_map, project_into, AttributeMap, Zero};
use tracing::debug;

pub(crate) struct Restrict {
    pub(crate) source: Relation,
    pub(crate) zero: Zero,
    pub(crate) keys: CandKeys,
    pub(crate) predicate: Predicate,
    domain: Zero,
    map: AttributeMap,
    pub(crate) err: ErrorSlot,
}

/// Constructs a restriction, pushing the predicate toward the leaves
/// wherever the algebra allows.
pub(crate) fn apply(source: &Relation, predicate: Predicate) -> Relation {
    // Split conjunctions first so each conjunct can sink independently.
    if let Some((p1, p2)) = predicate.split_and() {
        return apply(&apply(source, p2), p1);
    }
    let domain = predicate.domain().heading();
    if !predicate.well_formed() || !domain.is_sub_domain(&source.heading()) {
        return build(source, predicate);
    }
    match source.node() {
        Node::Project(inner) => {
            debug!(domain = %domain, "pushing restriction below projection");
            return project::build(&apply(&inner.source, predicate), inner.zero.clone());
        }
        Node::Rename(inner) => {
            debug!(domain = %domain, "pushing restriction below renaming");
            let pushed = predicate.rename_domain(&inner.zero, inner.source.zero());
            return rename::apply(&apply(&inner.source, pushed), inner.zero.clone());
        }
        Node::Union(inner) => {
            debug!(domain = %domain, "distributing restriction over union");
            return union::apply(
                &apply(&inner.left, predicate.clone()),
                &apply(&inner.right, predicate),
            );
        }
        Node::Diff(inner) => {
            debug!(domain = %domain, "distributing restriction over difference");
            return diff::apply(
                &apply(&inner.left, predicate.clone()),
                &apply(&inner.right, predicate),
            );
        }
        Node::Join(inner) => {
            let in_left = domain.is_sub_domain(&inner.left.heading());
            let in_right = domain.is_sub_domain(&inner.right.heading());
            if in_left || in_right {
                debug!(domain = %domain, "pushing restriction into join");
            }
            if in_left && in_right {
                return join::apply(
                    &apply(&inner.left, predicate.clone()),
                    &apply(&inner.right, predicate),
                    inner.zero.clone(),
                );
            }
            if in_left {
                return join::apply(
                    &apply(&inner.left, predicate),
                    &inner.right,
                    inner.zero.clone(),
                );
            }
            if in_right {
                return join::apply(
                    &inner.left,
                    &apply(&inner.right, predicate),
                    inner.zero.clone(),
                );
            }
        }
        // Safe only over the grouping attributes; value attributes are
        // produced by the aggregate and do not exist below the group-by.
        Node::GroupBy(inner) if domain.is_sub_domain(&inner.key_zero.heading()) => {
            debug!(domain = %domain, "pushing restriction below group-by");
            return groupby::apply(
                &apply(&inner.source, predicate),
                inner.zero.clone(),
                inner.value_zero.clone(),
                inner.aggregate.clone(),
            );
        }
        _ => {}
    }
    build(source, predicate)
}

/// Constructs the restriction node without rewriting.
pub(crate) fn build(source: &Relation, predicate: Predicate) -> Relation {
    let heading = source.heading();
    let domain = predicate.domain();
    let err = ErrorSlot::new();
    if !predicate.well_formed() || !domain.heading().is_sub_domain(&heading) {
        err.set(Error::PredicateDomain {
            domain: domain.heading().to_string(),
            heading: heading.to_string(),
        });
        return Relation::from_node(Node::Restrict(Restrict {
            source: source.clone(),
            zero: source.zero().clone(),
            keys: source.candidate_keys().clone(),
            predicate,
            domain,
            map: Vec::new(),
            err,
        }));
    }
    // The sub-domain check above makes this infallible.
    let map = field_map(source.zero(), &domain).unwrap();
    err.adopt(source.err());
    Relation::from_node(Node::Restrict(Restrict {
        source: source.clone(),
        zero: source.zero().clone(),
        keys: source.candidate_keys().clone(),
        predicate,
        domain,
        map,
        err,
    }))
}

impl Restrict {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let (child_sink, receiver) = TupleSink::bounded(self.source.zero().clone(), PIPE_CAPACITY);
        let child_cancel = self.source.stream(child_sink);
        let source = self.source.clone();
        let predicate = self.predicate.clone();
        let domain = self.domain.clone();
        let map = self.map.clone();
        let slot = self.err.clone();
        let mut signal = cancel.signal();
        tokio::spawn(async move {
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
                if !predicate.holds(&project_into(&tuple, &domain, &map)) {
                    continue;
                }
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
    use crate::{keys, tup, zero, Predicate, Relation};

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

    fn in_city(city: &'static str) -> Predicate {
        Predicate::new(zero! { City: Text }, move |t| {
            t.get(0).as_text() == Some(city)
        })
    }

    fn status_at_least(min: i64) -> Predicate {
        Predicate::new(zero! { Status: Int }, move |t| {
            t.get(0).as_int().map(|s| s >= min).unwrap_or(false)
        })
    }

    #[tokio::test]
    async fn test_filters_by_sub_tuple() {
        let london = suppliers().restrict(in_city("London"));
        assert_eq!(
            vec![tup!(1, "Smith", 20, "London"), tup!(4, "Clark", 20, "London")],
            london.tuples().await.unwrap()
        );
        assert_eq!(&keys![[SNO]], london.candidate_keys());
    }

    #[tokio::test]
    async fn test_conjunction_splits() {
        let r = suppliers().restrict(in_city("Paris").and(status_at_least(20)));
        assert_eq!(
            "σ{City}(σ{Status}(Relation({SNO, SName, Status, City})))",
            r.to_string()
        );
        assert_eq!(vec![tup!(3, "Blake", 30, "Paris")], r.tuples().await.unwrap());
    }

    #[tokio::test]
    async fn test_pushes_below_projection() {
        let r = suppliers()
            .project(zero! { SNO: Int, City: Text })
            .restrict(in_city("London"));
        assert_eq!(
            "π{SNO, City}(σ{City}(Relation({SNO, SName, Status, City})))",
            r.to_string()
        );
        assert_eq!(vec![tup!(1, "London"), tup!(4, "London")], r.tuples().await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_domain_is_deferred() {
        let r = suppliers().restrict(Predicate::new(zero! { Color: Text }, |_| true));
        assert!(r.err().is_some());
        assert!(r.tuples().await.is_err());
    }

    #[tokio::test]
    async fn test_or_predicate_stays_whole() {
        let r = suppliers().restrict(in_city("Athens").or(status_at_least(20)));
        assert_eq!(4, r.cardinality().await.unwrap());
    }
}
