use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Errors surfaced by relation construction and streaming.
///
/// Operators never return errors directly; a failure is parked on the
/// relation it occurred on and read back through [`Relation::err`] once
/// streaming has finished.
///
/// [`Relation::err`]: crate::Relation::err
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        found: String,
    },

    #[error("predicate domain {domain} is not a sub-domain of {heading}")]
    PredicateDomain { domain: String, heading: String },

    #[error("aggregate shape error: {0}")]
    AggregateShape(String),

    #[error("source error: {0}")]
    Source(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Write-once slot for a relation's deferred error.
///
/// The slot is shared by every clone of the relation handle; the first write
/// wins and later writes are dropped.
#[derive(Clone, Debug, Default)]
pub(crate) struct ErrorSlot(Arc<OnceCell<Error>>);

impl ErrorSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, err: Error) {
        let _ = self.0.set(err);
    }

    pub(crate) fn get(&self) -> Option<Error> {
        self.0.get().cloned()
    }

    /// Copies `err` into this slot if the slot is still empty.
    pub(crate) fn adopt(&self, err: Option<Error>) {
        if let Some(err) = err {
            self.set(err);
        }
    }
}
