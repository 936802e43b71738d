/*! Streaming relational algebra over typed, in-memory tuples.

Relations are sets of named tuples with identical attributes. The algebra
over them — [`project`], [`restrict`], [`rename`], [`union`], [`diff`],
[`join`], [`group_by`], and [`map`] — builds immutable expression trees
whose leaves wrap source data: a materialized collection ([`Relation::new`])
or an external lazy sequence ([`Relation::from_source`]).

While an expression is being built, the constructors look for algebraic
identities that let restrictions, projections, and renamings distribute over
the operators below them, with the goal of pushing each one all the way down
to the leaf relations. A restriction over a join whose predicate only reads
one side, for example, is rebuilt as a join of the restricted side.

A relation's body is produced on demand: [`Relation::stream`] starts a set
of cooperating tasks that pipe tuples through each operator into the
caller's [`TupleSink`], deduplicating wherever the candidate keys cannot
prove distinctness. Every stream is cancellable through the returned
[`Cancel`] handle, and cancellation cascades down the whole subtree.

```
use relalg::{keys, tup, zero, Relation};

# async fn demo() -> relalg::Result<()> {
let suppliers = Relation::new(
    zero! { SNO: Int, SName: Text, Status: Int, City: Text },
    vec![
        tup!(1, "Smith", 20, "London"),
        tup!(2, "Jones", 10, "Paris"),
    ],
    keys![[SNO]],
);
let cities = suppliers.project(zero! { City: Text });
assert_eq!(2, cities.cardinality().await?);
# Ok(())
# }
```

Errors never surface through operator composition: a failed construction or
a failed stream parks the first error on the relation, the stream closes
early, and [`Relation::err`] reports it afterwards.

[`project`]: Relation::project
[`restrict`]: Relation::restrict
[`rename`]: Relation::rename
[`union`]: Relation::union
[`diff`]: Relation::diff
[`join`]: Relation::join
[`group_by`]: Relation::group_by
[`map`]: Relation::map
*/

mod errors;
mod expression;
mod macros;
mod predicate;
mod stream;
mod tools;
mod tuple;

pub use errors::{Error, Result};
pub use expression::{Relation, Values};
pub use predicate::Predicate;
pub use stream::{Cancel, TupleSink};
pub use tools::{subset_candidate_keys, CandKeys};
pub use tuple::{
    attribute_map, combine, field_map, partial_equals, project_into, Attribute, AttributeMap,
    FieldPair, Heading, Kind, NotNan, Tuple, Value, Zero,
};
