use std::{fmt::Debug, hash::Hash};

use sharechain_primitives::{Share, ShareHash};

/// An item that can be indexed by the forest.
///
/// Each item names itself and exactly one predecessor. A predecessor that is never tracked
/// (e.g. the zero hash for genesis shares) simply marks the bottom of a chain.
pub trait ForestItem {
    /// Identifier type for the item
    type Id: Clone + Eq + Hash + Debug;

    /// Returns this item's unique identifier.
    fn id(&self) -> Self::Id;

    /// Returns the identifier of this item's predecessor.
    fn previous_id(&self) -> Self::Id;
}

/// An item that carries an amount of work which accumulates along its chain.
pub trait WorkItem: ForestItem {
    /// Work contributed by this item alone.
    fn work(&self) -> u128;
}

impl ForestItem for Share {
    type Id = ShareHash;

    fn id(&self) -> ShareHash {
        self.hash()
    }

    fn previous_id(&self) -> ShareHash {
        self.previous_hash()
    }
}

impl WorkItem for Share {
    fn work(&self) -> u128 {
        Share::work(self)
    }
}
