/*! Grouping with a user-supplied aggregate.

The output shape is the group key plus the attributes of a declared
value-tuple shape. Source tuples are bucketed by their projection onto the
grouping attributes; once the input is exhausted, each bucket's value-tuples
are folded by the aggregate and combined with the group key. */

use super::{Node, Relation};
use crate::errors::{Error, ErrorSlot};
use crate::stream::{Cancel, TupleSink, PIPE_CAPACITY};
use crate::tools::{self, CandKeys};
use crate::tuple::{attribute_map, combine, field_map, project_into, AttributeMap, Tuple, Zero};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) type Aggregate = Arc<dyn Fn(Values) -> Tuple + Send + Sync>;

/// The lazy sequence of one group's value-tuples, handed to the aggregate.
pub struct Values(std::vec::IntoIter<Tuple>);

impl Iterator for Values {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

pub(crate) struct GroupBy {
    pub(crate) source: Relation,
    pub(crate) zero: Zero,
    pub(crate) value_zero: Zero,
    // The grouping attributes: the output shape minus the value shape.
    pub(crate) key_zero: Zero,
    pub(crate) keys: CandKeys,
    pub(crate) aggregate: Aggregate,
    key_map: AttributeMap,
    value_map: AttributeMap,
    out_key_map: AttributeMap,
    out_value_map: AttributeMap,
    pub(crate) err: ErrorSlot,
}

pub(crate) fn apply(source: &Relation, zero: Zero, value: Zero, aggregate: Aggregate) -> Relation {
    let heading = source.heading();
    let out_heading = zero.heading();
    let value_heading = value.heading();
    let key_zero = zero.retain(|attr| value.position_of(attr).is_none());

    let err = ErrorSlot::new();
    let problem = if !value_heading.is_sub_domain(&out_heading) {
        Some(format!(
            "value shape {} is not a sub-domain of the output shape {}",
            value_heading, out_heading
        ))
    } else if key_zero.degree() == 0 {
        Some(format!("output shape {} has no grouping attributes", out_heading))
    } else if !value_heading.is_sub_domain(&heading) {
        Some(format!(
            "value shape {} is not a sub-domain of the source {}",
            value_heading, heading
        ))
    } else if !key_zero.heading().is_sub_domain(&heading) {
        Some(format!(
            "grouping attributes {} are not a sub-domain of the source {}",
            key_zero.heading(),
            heading
        ))
    } else {
        None
    };
    if let Some(message) = problem {
        err.set(Error::AggregateShape(message));
        return Relation::from_node(Node::GroupBy(GroupBy {
            source: source.clone(),
            keys: tools::default_keys(&zero),
            zero,
            value_zero: value,
            key_zero,
            aggregate,
            key_map: Vec::new(),
            value_map: Vec::new(),
            out_key_map: Vec::new(),
            out_value_map: Vec::new(),
            err,
        }));
    }

    // The sub-domain checks above make these infallible.
    let key_map = field_map(source.zero(), &key_zero).unwrap();
    let value_map = field_map(source.zero(), &value).unwrap();
    let out_key_map = attribute_map(&out_heading, &key_zero.heading());
    let out_value_map = attribute_map(&out_heading, &value_heading);
    let mut keys = vec![key_zero.attributes().cloned().collect()];
    tools::order_candidate_keys(&mut keys);
    err.adopt(source.err());
    Relation::from_node(Node::GroupBy(GroupBy {
        source: source.clone(),
        zero,
        value_zero: value,
        key_zero,
        keys,
        aggregate,
        key_map,
        value_map,
        out_key_map,
        out_value_map,
        err,
    }))
}

impl GroupBy {
    pub(crate) fn start(&self, sink: TupleSink, cancel: &Cancel) {
        let (child_sink, receiver) = TupleSink::bounded(self.source.zero().clone(), PIPE_CAPACITY);
        let child_cancel = self.source.stream(child_sink);
        let source = self.source.clone();
        let zero = self.zero.clone();
        let value_zero = self.value_zero.clone();
        let key_zero = self.key_zero.clone();
        let aggregate = self.aggregate.clone();
        let key_map = self.key_map.clone();
        let value_map = self.value_map.clone();
        let out_key_map = self.out_key_map.clone();
        let out_value_map = self.out_value_map.clone();
        let slot = self.err.clone();
        let mut signal = cancel.signal();
        tokio::spawn(async move {
            let mut groups: HashMap<Tuple, Vec<Tuple>> = HashMap::new();
            loop {
                let tuple = tokio::select! {
                    _ = signal.cancelled() => {
                        child_cancel.cancel();
                        return;
                    }
                    received = receiver.recv() => match received {
                        Ok(tuple) => tuple,
                        Err(_) => break,
                    },
                };
                let key = project_into(&tuple, &key_zero, &key_map);
                let value = project_into(&tuple, &value_zero, &value_map);
                groups.entry(key).or_default().push(value);
            }
            slot.adopt(source.err());
            if slot.get().is_some() {
                // The input was cut short; aggregating it would be wrong.
                return;
            }
            for (key, values) in groups {
                let result = (aggregate)(Values(values.into_iter()));
                if !value_zero.admits(&result) {
                    slot.set(Error::AggregateShape(format!(
                        "aggregate returned {} for value shape {}",
                        result, value_zero
                    )));
                    return;
                }
                let mut out = zero.blank();
                combine(&mut out, &key, &out_key_map);
                combine(&mut out, &result, &out_value_map);
                if !sink.send_or_cancel(out, &mut signal).await {
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::{keys, tup, zero, Relation, Tuple, Value};

    fn orders() -> Relation {
        Relation::new(
            zero! { PNO: Int, SNO: Int, Qty: Int },
            vec![
                tup!(1, 1, 300),
                tup!(1, 2, 200),
                tup!(1, 3, 400),
                tup!(1, 4, 200),
                tup!(1, 5, 100),
                tup!(1, 6, 100),
                tup!(2, 1, 300),
                tup!(2, 2, 400),
                tup!(3, 2, 200),
                tup!(4, 2, 200),
                tup!(4, 4, 300),
                tup!(4, 5, 400),
            ],
            keys![[PNO, SNO]],
        )
    }

    fn sum_qty(values: crate::Values) -> Tuple {
        let total: i64 = values.map(|t| t.get(0).as_int().unwrap()).sum();
        Tuple::from(vec![Value::Int(total)])
    }

    #[tokio::test]
    async fn test_sum_per_group() {
        let sums = orders().group_by(zero! { PNO: Int, Qty: Int }, zero! { Qty: Int }, sum_qty);
        assert_eq!(&keys![[PNO]], sums.candidate_keys());
        assert_eq!(
            vec![tup!(1, 1300), tup!(2, 700), tup!(3, 200), tup!(4, 900)],
            sums.tuples().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_input_has_no_groups() {
        let empty = Relation::new(zero! { PNO: Int, Qty: Int }, vec![], keys![]);
        let sums = empty.group_by(zero! { PNO: Int, Qty: Int }, zero! { Qty: Int }, sum_qty);
        assert_eq!(Vec::<Tuple>::new(), sums.tuples().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_grouping_attributes() {
        let sums = orders().group_by(zero! { Qty: Int }, zero! { Qty: Int }, sum_qty);
        assert!(matches!(sums.err(), Some(crate::Error::AggregateShape(_))));
        assert!(sums.tuples().await.is_err());
    }

    #[tokio::test]
    async fn test_value_shape_outside_source() {
        let sums = orders().group_by(
            zero! { PNO: Int, Weight: Float },
            zero! { Weight: Float },
            |_| tup!(0.0),
        );
        assert!(matches!(sums.err(), Some(crate::Error::AggregateShape(_))));
    }

    #[tokio::test]
    async fn test_misshapen_aggregate_output() {
        let sums = orders().group_by(zero! { PNO: Int, Qty: Int }, zero! { Qty: Int }, |_| {
            tup!("not a quantity")
        });
        assert!(sums.tuples().await.is_err());
        assert!(matches!(sums.err(), Some(crate::Error::AggregateShape(_))));
    }
}
