//! Error types for forest operations.

use std::fmt::Debug;

use thiserror::Error;

/// Errors that can occur while mutating or querying the forest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestError<Id: Debug> {
    /// Item with this id is already tracked
    #[error("item already present: {0:?}")]
    DuplicateItem(Id),

    /// Item with this id is not tracked
    #[error("unknown item: {0:?}")]
    UnknownItem(Id),

    /// Deltas were combined across spans that do not meet.
    #[error("cannot {op} delta {left:?} with delta {right:?} (head, tail)")]
    StructuralMismatch {
        op: &'static str,
        left: (Id, Id),
        right: (Id, Id),
    },

    /// The claimed ancestor is not below the item on its chain
    #[error("{ancestor:?} is not an ancestor of {item:?}")]
    NotAnAncestor { item: Id, ancestor: Id },

    /// Fewer items are known below `start` than the query needs.
    #[error("chain below {start:?} has {available} known items, {requested} requested")]
    InsufficientChain {
        start: Id,
        requested: u64,
        available: u64,
    },

    /// Item is not tracked by the superset of a subset tracker
    #[error("item not present in superset: {0:?}")]
    NotInSuperset(Id),

    /// Internal tracker state is inconsistent
    #[error("invalid tracker state: {0}")]
    InvalidState(&'static str),
}
