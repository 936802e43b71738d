/*! Candidate-key bookkeeping shared by the expression nodes. */

use crate::tuple::{Attribute, AttributeMap, Heading, Zero};
use std::collections::HashSet;

/// The candidate keys of a relation: a set of attribute sets, each injective
/// over the relation body.
pub type CandKeys = Vec<Vec<Attribute>>;

/// Puts candidate keys into canonical form: each key sorted by attribute, the
/// key list sorted by length then lexicographically, duplicates removed.
pub(crate) fn order_candidate_keys(keys: &mut CandKeys) {
    for key in keys.iter_mut() {
        key.sort_unstable();
    }
    keys.sort_unstable_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    keys.dedup();
}

/// The fallback key: all attributes of the shape.
pub(crate) fn default_keys(zero: &Zero) -> CandKeys {
    let mut keys = vec![zero.attributes().cloned().collect::<Vec<_>>()];
    order_candidate_keys(&mut keys);
    keys
}

/// Retains each key whose attributes all survive a projection described by
/// `map` (computed from `heading` to the projected shape); drops the rest.
pub fn subset_candidate_keys(keys: &CandKeys, heading: &Heading, map: &AttributeMap) -> CandKeys {
    let kept: HashSet<&Attribute> = map
        .iter()
        .map(|pair| &heading.fields()[pair.i].0)
        .collect();
    let mut result: CandKeys = keys
        .iter()
        .filter(|key| key.iter().all(|attr| kept.contains(attr)))
        .cloned()
        .collect();
    order_candidate_keys(&mut result);
    result
}

/// The candidate keys of a natural join: the attribute union of every pair of
/// keys drawn from the two sides.
pub(crate) fn join_candidate_keys(left: &CandKeys, right: &CandKeys) -> CandKeys {
    let mut result = Vec::with_capacity(left.len() * right.len());
    for lk in left {
        for rk in right {
            let mut key = lk.clone();
            for attr in rk {
                if !key.contains(attr) {
                    key.push(attr.clone());
                }
            }
            result.push(key);
        }
    }
    order_candidate_keys(&mut result);
    result
}

/// The keys present in both lists, compared as canonical sets.
pub(crate) fn intersect_candidate_keys(left: &CandKeys, right: &CandKeys) -> CandKeys {
    let mut left = left.clone();
    let mut right = right.clone();
    order_candidate_keys(&mut left);
    order_candidate_keys(&mut right);
    let mut result: CandKeys = left
        .into_iter()
        .filter(|key| right.contains(key))
        .collect();
    order_candidate_keys(&mut result);
    result
}

/// Rewrites each key through a positional renaming: the attribute at position
/// `i` of `from` becomes the attribute at position `i` of `to`.
pub(crate) fn rename_candidate_keys(keys: &CandKeys, from: &Zero, to: &Zero) -> CandKeys {
    let mut result: CandKeys = keys
        .iter()
        .map(|key| {
            key.iter()
                .map(|attr| match from.position_of(attr) {
                    Some(pos) => to.fields()[pos].0.clone(),
                    None => attr.clone(),
                })
                .collect()
        })
        .collect();
    order_candidate_keys(&mut result);
    result
}

/// True when every key draws only on attributes of `heading`.
pub(crate) fn keys_within(keys: &CandKeys, heading: &Heading) -> bool {
    keys.iter()
        .all(|key| key.iter().all(|attr| heading.kind_of(attr).is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{attribute_map, field_map, Value};

    fn attr(name: &str) -> Attribute {
        Attribute::new(name).unwrap()
    }

    fn key(names: &[&str]) -> Vec<Attribute> {
        names.iter().map(|n| attr(n)).collect()
    }

    #[test]
    fn test_order_candidate_keys() {
        let mut keys = vec![key(&["SNO", "PNO"]), key(&["B", "A"]), key(&["C"])];
        order_candidate_keys(&mut keys);
        assert_eq!(
            vec![key(&["C"]), key(&["A", "B"]), key(&["PNO", "SNO"])],
            keys
        );
    }

    #[test]
    fn test_order_drops_duplicates() {
        let mut keys = vec![key(&["B", "A"]), key(&["A", "B"])];
        order_candidate_keys(&mut keys);
        assert_eq!(vec![key(&["A", "B"])], keys);
    }

    #[test]
    fn test_subset_candidate_keys() {
        let zero = Zero::new(vec![
            (attr("SNO"), Value::Int(0)),
            (attr("SName"), Value::Text(String::new())),
            (attr("City"), Value::Text(String::new())),
        ])
        .unwrap();
        let keys = vec![key(&["SNO"]), key(&["SName", "City"])];

        let narrow = Zero::new(vec![
            (attr("SName"), Value::Text(String::new())),
            (attr("City"), Value::Text(String::new())),
        ])
        .unwrap();
        let map = field_map(&zero, &narrow).unwrap();
        assert_eq!(
            vec![key(&["City", "SName"])],
            subset_candidate_keys(&keys, &zero.heading(), &map)
        );

        let city = Zero::new(vec![(attr("City"), Value::Text(String::new()))]).unwrap();
        let map = field_map(&zero, &city).unwrap();
        assert!(subset_candidate_keys(&keys, &zero.heading(), &map).is_empty());
    }

    #[test]
    fn test_join_candidate_keys() {
        let left = vec![key(&["SNO"])];
        let right = vec![key(&["PNO"]), key(&["PName"])];
        assert_eq!(
            vec![key(&["PName", "SNO"]), key(&["PNO", "SNO"])],
            join_candidate_keys(&left, &right)
        );
    }

    #[test]
    fn test_join_candidate_keys_overlap() {
        let left = vec![key(&["SNO", "City"])];
        let right = vec![key(&["City"])];
        assert_eq!(
            vec![key(&["City", "SNO"])],
            join_candidate_keys(&left, &right)
        );
    }

    #[test]
    fn test_intersect_candidate_keys() {
        let left = vec![key(&["SNO"]), key(&["B", "A"])];
        let right = vec![key(&["A", "B"]), key(&["PNO"])];
        assert_eq!(vec![key(&["A", "B"])], intersect_candidate_keys(&left, &right));
        assert!(intersect_candidate_keys(&left, &vec![key(&["C"])]).is_empty());
    }

    #[test]
    fn test_rename_candidate_keys() {
        let from = Zero::new(vec![
            (attr("SNO"), Value::Int(0)),
            (attr("City"), Value::Text(String::new())),
        ])
        .unwrap();
        let to = Zero::new(vec![
            (attr("SupplierNo"), Value::Int(0)),
            (attr("Town"), Value::Text(String::new())),
        ])
        .unwrap();
        let keys = vec![key(&["SNO"]), key(&["SNO", "City"])];
        assert_eq!(
            vec![key(&["SupplierNo"]), key(&["SupplierNo", "Town"])],
            rename_candidate_keys(&keys, &from, &to)
        );
    }

    #[test]
    fn test_keys_within() {
        let zero = Zero::new(vec![(attr("A"), Value::Int(0))]).unwrap();
        let heading = zero.heading();
        assert!(keys_within(&vec![key(&["A"])], &heading));
        assert!(!keys_within(&vec![key(&["A", "B"])], &heading));
    }

    #[test]
    fn test_attribute_map_key_survival() {
        // A key survives only if every one of its attributes is shared.
        let a = Zero::new(vec![
            (attr("SNO"), Value::Int(0)),
            (attr("City"), Value::Text(String::new())),
        ])
        .unwrap();
        let b = Zero::new(vec![(attr("City"), Value::Text(String::new()))]).unwrap();
        let map = attribute_map(&a.heading(), &b.heading());
        let keys = vec![key(&["SNO"]), key(&["City"])];
        assert_eq!(
            vec![key(&["City"])],
            subset_candidate_keys(&keys, &a.heading(), &map)
        );
    }
}
