/*! Relational expressions.

A [`Relation`] is a handle over an immutable expression node: either a leaf
wrapping source data ([`Relation::new`], [`Relation::from_source`]) or an
operator over child relations. Operator constructors rewrite the tree as it
is built, pushing restrictions, projections, and renamings toward the leaf
relations before anything is streamed. */

use crate::errors::{Error, ErrorSlot, Result};
use crate::predicate::Predicate;
use crate::stream::{Cancel, TupleSink};
use crate::tools::CandKeys;
use crate::tuple::{Heading, Tuple, Zero};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

mod diff;
mod groupby;
mod join;
mod literal;
mod map;
mod project;
mod rename;
mod restrict;
mod source;
mod union;

pub use groupby::Values;

/// A relation: a tuple shape, a set of candidate keys, and a body that can
/// be streamed on demand as a deduplicated set of tuples.
///
/// Handles are cheap to clone and share their node, so expression trees form
/// acyclic shared-reference graphs.
#[derive(Clone)]
pub struct Relation {
    node: Arc<Node>,
}

pub(crate) enum Node {
    Literal(literal::Literal),
    Source(source::Source),
    Project(project::Project),
    Restrict(restrict::Restrict),
    Rename(rename::Rename),
    Union(union::Union),
    Diff(diff::Diff),
    Join(join::Join),
    GroupBy(groupby::GroupBy),
    Map(map::MapExpr),
}

impl Node {
    fn zero(&self) -> &Zero {
        match self {
            Node::Literal(n) => &n.zero,
            Node::Source(n) => &n.zero,
            Node::Project(n) => &n.zero,
            Node::Restrict(n) => &n.zero,
            Node::Rename(n) => &n.zero,
            Node::Union(n) => &n.zero,
            Node::Diff(n) => &n.zero,
            Node::Join(n) => &n.zero,
            Node::GroupBy(n) => &n.zero,
            Node::Map(n) => &n.zero,
        }
    }

    fn keys(&self) -> &CandKeys {
        match self {
            Node::Literal(n) => &n.keys,
            Node::Source(n) => &n.keys,
            Node::Project(n) => &n.keys,
            Node::Restrict(n) => &n.keys,
            Node::Rename(n) => &n.keys,
            Node::Union(n) => &n.keys,
            Node::Diff(n) => &n.keys,
            Node::Join(n) => &n.keys,
            Node::GroupBy(n) => &n.keys,
            Node::Map(n) => &n.keys,
        }
    }

    fn err_slot(&self) -> &ErrorSlot {
        match self {
            Node::Literal(n) => &n.err,
            Node::Source(n) => &n.err,
            Node::Project(n) => &n.err,
            Node::Restrict(n) => &n.err,
            Node::Rename(n) => &n.err,
            Node::Union(n) => &n.err,
            Node::Diff(n) => &n.err,
            Node::Join(n) => &n.err,
            Node::GroupBy(n) => &n.err,
            Node::Map(n) => &n.err,
        }
    }

    fn start(&self, sink: TupleSink, cancel: &Cancel) {
        match self {
            Node::Literal(n) => n.start(sink, cancel),
            Node::Source(n) => n.start(sink, cancel),
            Node::Project(n) => n.start(sink, cancel),
            Node::Restrict(n) => n.start(sink, cancel),
            Node::Rename(n) => n.start(sink, cancel),
            Node::Union(n) => n.start(sink, cancel),
            Node::Diff(n) => n.start(sink, cancel),
            Node::Join(n) => n.start(sink, cancel),
            Node::GroupBy(n) => n.start(sink, cancel),
            Node::Map(n) => n.start(sink, cancel),
        }
    }
}

impl Relation {
    pub(crate) fn from_node(node: Node) -> Relation {
        Relation {
            node: Arc::new(node),
        }
    }

    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    /// A leaf relation over materialized tuples.
    ///
    /// With an empty key list the data is sorted and deduplicated eagerly
    /// and the relation gets the all-attributes key; with keys supplied the
    /// data is trusted to be distinct already.
    pub fn new(zero: Zero, tuples: Vec<Tuple>, keys: CandKeys) -> Relation {
        literal::build(zero, tuples, keys)
    }

    /// A leaf relation over an external lazy sequence of tuples.
    ///
    /// Unless `source_distinct`, tuples are deduplicated on emission. The
    /// receiver is consumed by the first `stream` call; streaming the
    /// relation a second time surfaces a source error.
    pub fn from_source(
        zero: Zero,
        receiver: async_channel::Receiver<Tuple>,
        keys: CandKeys,
        source_distinct: bool,
    ) -> Relation {
        source::build(zero, receiver, keys, source_distinct)
    }

    /// The exemplar tuple describing this relation's shape.
    pub fn zero(&self) -> &Zero {
        self.node.zero()
    }

    pub fn heading(&self) -> Heading {
        self.node.zero().heading()
    }

    pub fn candidate_keys(&self) -> &CandKeys {
        self.node.keys()
    }

    /// The number of attributes.
    pub fn degree(&self) -> usize {
        self.node.zero().degree()
    }

    /// The first error encountered during construction or streaming, if any.
    pub fn err(&self) -> Option<Error> {
        self.node.err_slot().get()
    }

    pub(crate) fn err_slot(&self) -> &ErrorSlot {
        self.node.err_slot()
    }

    /// Projection onto the shape `zero`, which must be a sub-domain of this
    /// relation's heading.
    pub fn project(&self, zero: Zero) -> Relation {
        project::apply(self, zero)
    }

    /// Restriction to the tuples satisfying `predicate`.
    pub fn restrict(&self, predicate: Predicate) -> Relation {
        restrict::apply(self, predicate)
    }

    /// Relabels attributes positionally: `zero` must have the same degree
    /// and the same kind at every position.
    pub fn rename(&self, zero: Zero) -> Relation {
        rename::apply(self, zero)
    }

    /// Set union; both inputs must have equal headings.
    pub fn union(&self, other: &Relation) -> Relation {
        union::apply(self, other)
    }

    /// Set difference; both inputs must have equal headings and `other`
    /// must be finite.
    pub fn diff(&self, other: &Relation) -> Relation {
        diff::apply(self, other)
    }

    /// Natural join. `zero` must equal the attribute-name union of the two
    /// input headings.
    pub fn join(&self, other: &Relation, zero: Zero) -> Relation {
        join::apply(self, other, zero)
    }

    /// Groups by the attributes of `zero` not in `value` and folds each
    /// group's value-tuples with `aggregate`.
    pub fn group_by(
        &self,
        zero: Zero,
        value: Zero,
        aggregate: impl Fn(Values) -> Tuple + Send + Sync + 'static,
    ) -> Relation {
        groupby::apply(self, zero, value, Arc::new(aggregate))
    }

    /// One-to-one transformation by an opaque function. With an empty key
    /// list the output is deduplicated on emission.
    pub fn map(
        &self,
        zero: Zero,
        keys: CandKeys,
        transform: impl Fn(&Tuple) -> Tuple + Send + Sync + 'static,
    ) -> Relation {
        map::apply(self, zero, keys, Arc::new(transform))
    }

    /// Starts streaming the body into `sink` and returns the cancellation
    /// handle. Must be called within a tokio runtime.
    ///
    /// The sink's shape must equal this relation's zero field-for-field; a
    /// mismatch parks a shape error on the relation and closes the sink
    /// without emitting. The sink also closes on completion, error, and
    /// cancellation.
    pub fn stream(&self, sink: TupleSink) -> Cancel {
        let cancel = Cancel::new();
        if sink.zero() != self.zero() {
            self.err_slot().set(Error::ShapeMismatch {
                context: "destination sink",
                expected: self.zero().to_string(),
                found: sink.zero().to_string(),
            });
            return cancel;
        }
        if self.err().is_some() {
            return cancel;
        }
        trace!(relation = %self, "starting stream");
        self.node.start(sink, &cancel);
        cancel
    }

    /// Materializes the body as a sorted vector of distinct tuples.
    pub async fn tuples(&self) -> Result<Vec<Tuple>> {
        let (sink, receiver) = TupleSink::bounded(self.zero().clone(), 64);
        let _cancel = self.stream(sink);
        let mut body = Vec::new();
        while let Ok(tuple) = receiver.recv().await {
            body.push(tuple);
        }
        if let Some(err) = self.err() {
            return Err(err);
        }
        body.sort_unstable();
        Ok(body)
    }

    /// The number of tuples in the body. Materializes the relation.
    pub async fn cardinality(&self) -> Result<usize> {
        Ok(self.tuples().await?.len())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::Literal(n) => write!(f, "Relation({})", n.zero.heading()),
            Node::Source(n) => write!(f, "Relation({})", n.zero.heading()),
            Node::Project(n) => write!(f, "π{}({})", n.zero.heading(), n.source),
            Node::Restrict(n) => write!(f, "σ{}({})", n.predicate, n.source),
            Node::Rename(n) => write!(f, "ρ{}({})", n.zero.heading(), n.source),
            Node::Union(n) => write!(f, "{} ∪ {}", n.left, n.right),
            Node::Diff(n) => write!(f, "{} − {}", n.left, n.right),
            Node::Join(n) => write!(f, "{} ⋈ {}", n.left, n.right),
            Node::GroupBy(n) => write!(f, "γ{}({})", n.key_zero.heading(), n.source),
            Node::Map(n) => write!(f, "μ({})", n.source),
        }
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::Literal(n) => {
                write!(f, "Relation::new({}, [", n.zero.heading())?;
                for (pos, tuple) in n.tuples.iter().enumerate() {
                    if pos > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", tuple)?;
                }
                write!(f, "], {:?})", keys_names(&n.keys))
            }
            Node::Source(n) => write!(
                f,
                "Relation::from_source({}, {:?})",
                n.zero.heading(),
                keys_names(&n.keys)
            ),
            Node::Project(n) => write!(f, "{:?}.project({})", n.source, n.zero.heading()),
            Node::Restrict(n) => write!(f, "{:?}.restrict({})", n.source, n.predicate),
            Node::Rename(n) => write!(f, "{:?}.rename({})", n.source, n.zero.heading()),
            Node::Union(n) => write!(f, "{:?}.union({:?})", n.left, n.right),
            Node::Diff(n) => write!(f, "{:?}.diff({:?})", n.left, n.right),
            Node::Join(n) => {
                write!(f, "{:?}.join({:?}, {})", n.left, n.right, n.zero.heading())
            }
            Node::GroupBy(n) => write!(
                f,
                "{:?}.group_by({}, {})",
                n.source,
                n.zero.heading(),
                n.value_zero.heading()
            ),
            Node::Map(n) => write!(f, "{:?}.map({})", n.source, n.zero.heading()),
        }
    }
}

fn keys_names(keys: &CandKeys) -> Vec<Vec<&str>> {
    keys.iter()
        .map(|key| key.iter().map(|attr| attr.name()).collect())
        .collect()
}
