use std::{collections::HashSet, sync::Arc};

use parking_lot::Mutex;
use sharechain_forest::{DeltaAttrs, Tracker, WatchId};
use sharechain_primitives::{Share, ShareHash};
use tracing::trace;

use crate::RelayError;

/// Shares already offered to peers.
///
/// Entries are purged when the tracker drops the share, so the set never outgrows it.
#[derive(Debug, Clone)]
pub struct KnownShares {
    hashes: Arc<Mutex<HashSet<ShareHash>>>,
    watch: WatchId,
}

impl KnownShares {
    /// Seeds the set with everything the tracker holds and subscribes to its removals.
    pub fn attach<A>(tracker: &mut Tracker<Share, A>) -> Self
    where
        A: DeltaAttrs<Share>,
    {
        let hashes: HashSet<ShareHash> = tracker.items().map(Share::hash).collect();
        let hashes = Arc::new(Mutex::new(hashes));

        let purge = hashes.clone();
        let watch = tracker.removed().watch(move |share: &Share| {
            purge.lock().remove(&share.hash());
            Ok(())
        });

        Self { hashes, watch }
    }

    /// Stops following the tracker's removals.
    pub fn detach<A>(self, tracker: &mut Tracker<Share, A>)
    where
        A: DeltaAttrs<Share>,
    {
        tracker.removed().unwatch(self.watch);
    }

    pub fn contains(&self, hash: &ShareHash) -> bool {
        self.hashes.lock().contains(hash)
    }

    /// Marks `hash` as shared. Returns `false` if it already was.
    pub fn insert(&self, hash: ShareHash) -> bool {
        self.hashes.lock().insert(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.lock().is_empty()
    }
}

/// Collects the shares to offer peers after `best` became the best share: walking down at
/// most `depth` shares, stopping at the first one already shared.
pub fn broadcast_batch<A>(
    known: &KnownShares,
    tracker: &mut Tracker<Share, A>,
    best: &ShareHash,
    depth: u64,
) -> Result<Vec<Share>, RelayError>
where
    A: DeltaAttrs<Share>,
{
    let len = depth.min(tracker.get_height(best)?);
    let mut batch = Vec::new();
    for share in tracker.get_chain(best, len)? {
        if !known.insert(share.hash()) {
            break;
        }
        batch.push(share.clone());
    }
    trace!(%best, shares = batch.len(), "broadcast batch");
    Ok(batch)
}
