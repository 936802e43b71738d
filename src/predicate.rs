/*! Predicates for restriction: a boolean test over a declared sub-tuple
domain, composable with `and`, `or`, and `not`. */

use crate::tuple::{field_map, project_into, AttributeMap, Tuple, Zero};
use std::fmt;
use std::sync::Arc;

/// A test over tuples of a declared domain heading.
///
/// The test function receives the sub-tuple obtained by projecting a source
/// tuple onto the predicate's domain, in the domain's declared field order.
#[derive(Clone)]
pub struct Predicate {
    kind: Kind,
}

#[derive(Clone)]
enum Kind {
    Test {
        domain: Zero,
        test: Arc<dyn Fn(&Tuple) -> bool + Send + Sync>,
    },
    And(Compound),
    Or(Compound),
    Not(Box<Predicate>),
}

/// A two-sided composition along with the projections from the combined
/// domain back onto each side's own domain.
#[derive(Clone)]
struct Compound {
    left: Box<Predicate>,
    right: Box<Predicate>,
    domain: Zero,
    // None when the two domains disagree on a shared attribute's kind; such
    // a predicate is rejected by restrict before it can be evaluated.
    left_map: Option<AttributeMap>,
    right_map: Option<AttributeMap>,
}

impl Compound {
    fn new(left: Predicate, right: Predicate) -> Compound {
        let left_domain = left.domain();
        let right_domain = right.domain();
        let mut fields = left_domain.fields().to_vec();
        for (attr, zero) in right_domain.fields() {
            if left_domain.position_of(attr).is_none() {
                fields.push((attr.clone(), zero.clone()));
            }
        }
        // Unique by construction, so this cannot fail on duplicates.
        let domain = Zero::new(fields).unwrap();
        let left_map = field_map(&domain, &left_domain).ok();
        let right_map = field_map(&domain, &right_domain).ok();
        Compound {
            left: Box::new(left),
            right: Box::new(right),
            domain,
            left_map,
            right_map,
        }
    }

    fn holds(&self, tuple: &Tuple, conjunctive: bool) -> bool {
        let (Some(left_map), Some(right_map)) = (&self.left_map, &self.right_map) else {
            return false;
        };
        let left = self
            .left
            .holds(&project_into(tuple, &self.left.domain(), left_map));
        if conjunctive {
            left && self
                .right
                .holds(&project_into(tuple, &self.right.domain(), right_map))
        } else {
            left || self
                .right
                .holds(&project_into(tuple, &self.right.domain(), right_map))
        }
    }

    fn well_formed(&self) -> bool {
        self.left_map.is_some()
            && self.right_map.is_some()
            && self.left.well_formed()
            && self.right.well_formed()
    }
}

impl Predicate {
    pub fn new(domain: Zero, test: impl Fn(&Tuple) -> bool + Send + Sync + 'static) -> Predicate {
        Predicate {
            kind: Kind::Test {
                domain,
                test: Arc::new(test),
            },
        }
    }

    /// Holds iff both predicates hold; the domain is the union of domains.
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate {
            kind: Kind::And(Compound::new(self, other)),
        }
    }

    /// Holds iff either predicate holds; the domain is the union of domains.
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate {
            kind: Kind::Or(Compound::new(self, other)),
        }
    }

    /// Negation over the same domain.
    pub fn not(self) -> Predicate {
        Predicate {
            kind: Kind::Not(Box::new(self)),
        }
    }

    /// The shape of the sub-tuples this predicate is evaluated over.
    pub fn domain(&self) -> Zero {
        match &self.kind {
            Kind::Test { domain, .. } => domain.clone(),
            Kind::And(compound) | Kind::Or(compound) => compound.domain.clone(),
            Kind::Not(inner) => inner.domain(),
        }
    }

    /// Evaluates the predicate over a tuple of its own domain shape.
    pub fn holds(&self, tuple: &Tuple) -> bool {
        match &self.kind {
            Kind::Test { test, .. } => test(tuple),
            Kind::And(compound) => compound.holds(tuple, true),
            Kind::Or(compound) => compound.holds(tuple, false),
            Kind::Not(inner) => !inner.holds(tuple),
        }
    }

    /// The two conjuncts of a top-level `and`, used to restrict by each
    /// independently.
    pub(crate) fn split_and(&self) -> Option<(Predicate, Predicate)> {
        match &self.kind {
            Kind::And(compound) => Some(((*compound.left).clone(), (*compound.right).clone())),
            _ => None,
        }
    }

    /// True when every composition in the predicate is kind-consistent.
    pub(crate) fn well_formed(&self) -> bool {
        match &self.kind {
            Kind::Test { .. } => true,
            Kind::And(compound) | Kind::Or(compound) => compound.well_formed(),
            Kind::Not(inner) => inner.well_formed(),
        }
    }

    /// Rewrites the predicate's domain through a positional renaming: the
    /// attribute at position `p` of `from` becomes the attribute at position
    /// `p` of `to`. The test functions are untouched (they are positional).
    pub(crate) fn rename_domain(&self, from: &Zero, to: &Zero) -> Predicate {
        match &self.kind {
            Kind::Test { domain, test } => {
                let fields = domain
                    .fields()
                    .iter()
                    .map(|(attr, zero)| {
                        let attr = match from.position_of(attr) {
                            Some(pos) => to.fields()[pos].0.clone(),
                            None => attr.clone(),
                        };
                        (attr, zero.clone())
                    })
                    .collect();
                Predicate {
                    kind: Kind::Test {
                        // Renaming maps distinct names to distinct names.
                        domain: Zero::new(fields).unwrap(),
                        test: test.clone(),
                    },
                }
            }
            Kind::And(compound) => compound
                .left
                .rename_domain(from, to)
                .and(compound.right.rename_domain(from, to)),
            Kind::Or(compound) => compound
                .left
                .rename_domain(from, to)
                .or(compound.right.rename_domain(from, to)),
            Kind::Not(inner) => inner.rename_domain(from, to).not(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain().heading())
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Test { domain, .. } => write!(f, "Predicate({})", domain.heading()),
            Kind::And(c) => write!(f, "({:?} ∧ {:?})", c.left, c.right),
            Kind::Or(c) => write!(f, "({:?} ∨ {:?})", c.left, c.right),
            Kind::Not(inner) => write!(f, "¬{:?}", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Attribute, Value};

    fn attr(name: &str) -> Attribute {
        Attribute::new(name).unwrap()
    }

    fn city_domain() -> Zero {
        Zero::new(vec![(attr("City"), Value::Text(String::new()))]).unwrap()
    }

    fn status_domain() -> Zero {
        Zero::new(vec![(attr("Status"), Value::Int(0))]).unwrap()
    }

    fn in_london() -> Predicate {
        Predicate::new(city_domain(), |t| t.get(0).as_text() == Some("London"))
    }

    fn status_over(min: i64) -> Predicate {
        Predicate::new(status_domain(), move |t| {
            t.get(0).as_int().map(|s| s > min).unwrap_or(false)
        })
    }

    #[test]
    fn test_atom() {
        let p = in_london();
        assert!(p.holds(&Tuple::from(vec![Value::from("London")])));
        assert!(!p.holds(&Tuple::from(vec![Value::from("Paris")])));
    }

    #[test]
    fn test_and_domain_is_union() {
        let p = in_london().and(status_over(15));
        let heading = p.domain().heading();
        assert_eq!(2, heading.degree());
        assert!(city_domain().heading().is_sub_domain(&heading));
        assert!(status_domain().heading().is_sub_domain(&heading));
    }

    #[test]
    fn test_and_or_not() {
        let both = in_london().and(status_over(15));
        // Combined domain order: City then Status.
        let london20 = Tuple::from(vec![Value::from("London"), Value::Int(20)]);
        let london10 = Tuple::from(vec![Value::from("London"), Value::Int(10)]);
        let paris20 = Tuple::from(vec![Value::from("Paris"), Value::Int(20)]);
        assert!(both.holds(&london20));
        assert!(!both.holds(&london10));
        assert!(!both.holds(&paris20));

        let either = in_london().or(status_over(15));
        assert!(either.holds(&london10));
        assert!(either.holds(&paris20));
        assert!(!either.holds(&Tuple::from(vec![Value::from("Paris"), Value::Int(10)])));

        let neither = in_london().or(status_over(15)).not();
        assert!(neither.holds(&Tuple::from(vec![Value::from("Paris"), Value::Int(10)])));
    }

    #[test]
    fn test_split_and() {
        let p = in_london().and(status_over(15));
        assert!(p.split_and().is_some());
        assert!(in_london().split_and().is_none());
    }

    #[test]
    fn test_shared_attribute_same_kind() {
        let p1 = in_london();
        let p2 = Predicate::new(city_domain(), |t| t.get(0).as_text() != Some("Oslo"));
        let p = p1.and(p2);
        assert_eq!(1, p.domain().degree());
        assert!(p.well_formed());
        assert!(p.holds(&Tuple::from(vec![Value::from("London")])));
    }

    #[test]
    fn test_kind_conflict_is_malformed() {
        let text_city = in_london();
        let int_city = Predicate::new(
            Zero::new(vec![(attr("City"), Value::Int(0))]).unwrap(),
            |_| true,
        );
        let p = text_city.and(int_city);
        assert!(!p.well_formed());
    }

    #[test]
    fn test_rename_domain() {
        let from = Zero::new(vec![
            (attr("Town"), Value::Text(String::new())),
            (attr("Rank"), Value::Int(0)),
        ])
        .unwrap();
        let to = Zero::new(vec![
            (attr("City"), Value::Text(String::new())),
            (attr("Status"), Value::Int(0)),
        ])
        .unwrap();
        let over_town = Predicate::new(
            Zero::new(vec![(attr("Town"), Value::Text(String::new()))]).unwrap(),
            |t| t.get(0).as_text() == Some("London"),
        );
        let renamed = over_town.rename_domain(&from, &to);
        assert_eq!(Some(0), renamed.domain().position_of(&attr("City")));
        assert!(renamed.holds(&Tuple::from(vec![Value::from("London")])));
    }
}
