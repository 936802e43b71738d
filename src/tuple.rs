/*! The tuple model: attributes, scalar values, tuple shapes and headings, and
the positional maps that relate tuples of different shapes to each other. */

use crate::errors::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A totally ordered float that refuses to hold NaN.
///
/// Tuples must be usable as keys of value sets, so every scalar has to be
/// `Eq + Ord + Hash`; excluding NaN at construction makes the float ordering
/// total.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct NotNan(f64);

impl NotNan {
    pub fn new(value: f64) -> Option<NotNan> {
        if value.is_nan() {
            return None;
        }
        // Normalize the negative zero so that equal values hash equally.
        Some(NotNan(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Eq for NotNan {}

impl Ord for NotNan {
    fn cmp(&self, other: &Self) -> Ordering {
        // Construction rejects NaN, so a partial comparison always succeeds.
        self.0.partial_cmp(&other.0).unwrap()
    }
}

impl Hash for NotNan {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for NotNan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scalar types a tuple field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Bool,
    Int,
    Float,
    Text,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Bool => write!(f, "BOOL"),
            Kind::Int => write!(f, "INT"),
            Kind::Float => write!(f, "FLOAT"),
            Kind::Text => write!(f, "TEXT"),
        }
    }
}

/// A scalar value carried by a tuple field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(NotNan),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Text(_) => Kind::Text,
        }
    }

    /// The zero value of a kind, used to seed blank tuples.
    pub fn zero_of(kind: Kind) -> Value {
        match kind {
            Kind::Bool => Value::Bool(false),
            Kind::Int => Value::Int(0),
            Kind::Float => Value::Float(NotNan(0.0)),
            Kind::Text => Value::Text(String::new()),
        }
    }

    /// Converts a program-text literal, as written in the [`tup!`] macro.
    ///
    /// Panics when the conversion fails (a NaN float literal); literals are
    /// part of the program text, not data. Runtime conversions go through
    /// the `From` impls and `TryFrom<f64>` instead.
    ///
    /// [`tup!`]: crate::tup
    pub fn literal<T>(value: T) -> Value
    where
        T: TryInto<Value>,
        T::Error: fmt::Debug,
    {
        value.try_into().expect("a valid relational value literal")
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(v.get()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<NotNan> for Value {
    fn from(value: NotNan) -> Self {
        Value::Float(value)
    }
}

impl TryFrom<f64> for Value {
    type Error = Error;

    fn try_from(value: f64) -> Result<Value, Self::Error> {
        match NotNan::new(value) {
            Some(float) => Ok(Value::Float(float)),
            None => Err(Error::ShapeMismatch {
                context: "float value",
                expected: "a non-NaN float".into(),
                found: "NaN".into(),
            }),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// The name of a tuple field.
///
/// Attributes must be legal structural field names: an ASCII alphabetic
/// leading character followed by ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attribute(String);

impl Attribute {
    pub fn new(name: impl Into<String>) -> Result<Attribute> {
        let name = name.into();
        let mut chars = name.chars();
        let legal = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric()),
            _ => false,
        };
        if !legal {
            return Err(Error::ShapeMismatch {
                context: "attribute name",
                expected: "an alphabetic leading character followed by alphanumerics".into(),
                found: format!("{:?}", name),
            });
        }
        Ok(Attribute(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An exemplar tuple of zero values: the runtime description of a tuple shape.
///
/// A `Zero` is an ordered sequence of named fields. Equality is sequence
/// equality; use [`Zero::heading`] for the order-insignificant view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zero {
    fields: Vec<(Attribute, Value)>,
}

impl Zero {
    pub fn new(fields: Vec<(Attribute, Value)>) -> Result<Zero> {
        for (pos, (attr, _)) in fields.iter().enumerate() {
            if fields[..pos].iter().any(|(a, _)| a == attr) {
                return Err(Error::ShapeMismatch {
                    context: "tuple shape",
                    expected: "distinct attribute names".into(),
                    found: attr.to_string(),
                });
            }
        }
        Ok(Zero { fields })
    }

    pub fn degree(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[(Attribute, Value)] {
        &self.fields
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.fields.iter().map(|(attr, _)| attr)
    }

    pub fn position_of(&self, attr: &Attribute) -> Option<usize> {
        self.fields.iter().position(|(a, _)| a == attr)
    }

    pub fn kind_at(&self, position: usize) -> Kind {
        self.fields[position].1.kind()
    }

    pub fn heading(&self) -> Heading {
        Heading {
            fields: self
                .fields
                .iter()
                .map(|(attr, value)| (attr.clone(), value.kind()))
                .collect(),
        }
    }

    /// A fresh tuple of this shape with every field at its zero value.
    pub fn blank(&self) -> Tuple {
        Tuple {
            values: self.fields.iter().map(|(_, value)| value.clone()).collect(),
        }
    }

    /// True when `tuple` has this shape: same degree, same kind per position.
    pub fn admits(&self, tuple: &Tuple) -> bool {
        tuple.values.len() == self.fields.len()
            && tuple
                .values
                .iter()
                .zip(&self.fields)
                .all(|(value, (_, zero))| value.kind() == zero.kind())
    }

    /// The sub-shape holding only the fields whose attribute satisfies
    /// `keep`, in this shape's order.
    pub fn retain(&self, mut keep: impl FnMut(&Attribute) -> bool) -> Zero {
        Zero {
            fields: self
                .fields
                .iter()
                .filter(|(attr, _)| keep(attr))
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for Zero {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.heading())
    }
}

/// The set of (attribute, kind) pairs of a relation's tuples.
///
/// Field order is retained for stable printing but is insignificant for
/// equality.
#[derive(Debug, Clone, Eq)]
pub struct Heading {
    fields: Vec<(Attribute, Kind)>,
}

impl Heading {
    pub fn degree(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[(Attribute, Kind)] {
        &self.fields
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.fields.iter().map(|(attr, _)| attr)
    }

    pub fn kind_of(&self, attr: &Attribute) -> Option<Kind> {
        self.fields
            .iter()
            .find(|(a, _)| a == attr)
            .map(|(_, kind)| *kind)
    }

    pub fn contains(&self, attr: &Attribute, kind: Kind) -> bool {
        self.kind_of(attr) == Some(kind)
    }

    /// True when every (attribute, kind) pair of `self` occurs in `other`.
    pub fn is_sub_domain(&self, other: &Heading) -> bool {
        self.fields
            .iter()
            .all(|(attr, kind)| other.contains(attr, *kind))
    }
}

impl PartialEq for Heading {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len() && self.is_sub_domain(other)
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (pos, (attr, _)) in self.fields.iter().enumerate() {
            if pos > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", attr)?;
        }
        write!(f, "}}")
    }
}

/// A tuple: positionally stored field values, interpreted through a [`Zero`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, position: usize) -> &Value {
        &self.values[position]
    }

    pub(crate) fn set(&mut self, position: usize, value: Value) {
        self.values[position] = value;
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Tuple { values }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (pos, value) in self.values.iter().enumerate() {
            if pos > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// One correspondence in an [`AttributeMap`]: position `i` in the first
/// heading holds the same attribute as position `j` in the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPair {
    pub i: usize,
    pub j: usize,
}

/// The positional correspondences of the attributes two headings share.
pub type AttributeMap = Vec<FieldPair>;

/// Positions of the attributes shared by `a` and `b` (same name and kind),
/// ordered by position in `a`.
pub fn attribute_map(a: &Heading, b: &Heading) -> AttributeMap {
    let mut map = Vec::new();
    for (i, (attr, kind)) in a.fields().iter().enumerate() {
        if let Some(j) = b
            .fields()
            .iter()
            .position(|(other, other_kind)| other == attr && other_kind == kind)
        {
            map.push(FieldPair { i, j });
        }
    }
    map
}

/// Like [`attribute_map`] over shapes, but every field of `to` must be
/// present in `from`.
pub fn field_map(from: &Zero, to: &Zero) -> Result<AttributeMap> {
    let from_heading = from.heading();
    let mut map = Vec::new();
    for (j, (attr, zero)) in to.fields().iter().enumerate() {
        match from.position_of(attr) {
            Some(i) if from.kind_at(i) == zero.kind() => map.push(FieldPair { i, j }),
            _ => {
                return Err(Error::ShapeMismatch {
                    context: "field map",
                    expected: format!("{} {} in {}", attr, zero.kind(), from_heading),
                    found: "absent or differently typed".into(),
                })
            }
        }
    }
    Ok(map)
}

/// True iff every mapped coordinate pair of the two tuples is equal by value.
pub fn partial_equals(a: &Tuple, b: &Tuple, map: &AttributeMap) -> bool {
    map.iter().all(|pair| a.get(pair.i) == b.get(pair.j))
}

/// Copies mapped fields of `src` into `dest`, where `map` was computed from
/// (dest heading, src heading). Unmapped fields of `dest` are left alone.
pub fn combine(dest: &mut Tuple, src: &Tuple, map: &AttributeMap) {
    for pair in map {
        dest.set(pair.i, src.get(pair.j).clone());
    }
}

/// Builds a tuple of shape `dest` from `src`, where `map` was computed by
/// [`field_map`] from (src shape, dest shape).
pub fn project_into(src: &Tuple, dest: &Zero, map: &AttributeMap) -> Tuple {
    let mut out = dest.blank();
    for pair in map {
        out.set(pair.j, src.get(pair.i).clone());
    }
    out
}
