use serde::{Deserialize, Serialize};

use crate::ShareHash;

/// Summary of a share as handed to the share-chain index.
///
/// Shares arrive already validated; only the linkage and the amount of work
/// they represent matter here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    hash: ShareHash,
    previous_hash: ShareHash,
    /// Expected number of hash attempts needed to produce the share.
    work: u128,
}

impl Share {
    pub fn new(hash: ShareHash, previous_hash: ShareHash, work: u128) -> Self {
        Self {
            hash,
            previous_hash,
            work,
        }
    }

    pub fn hash(&self) -> ShareHash {
        self.hash
    }

    pub fn previous_hash(&self) -> ShareHash {
        self.previous_hash
    }

    pub fn work(&self) -> u128 {
        self.work
    }

    /// Returns whether this share starts a chain (has no predecessor).
    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_zero()
    }
}
