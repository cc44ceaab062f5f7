use sharechain_forest::{DeltaAttrs, Tracker};
use sharechain_primitives::{Share, ShareHash};
use tracing::{debug, info};

use crate::RelayError;

/// Batches larger than this are logged at info level.
const NOISY_BATCH: usize = 5;

/// Adds every share not yet tracked and returns how many were new.
pub fn ingest_shares<A, T>(tracker: &mut Tracker<Share, A>, shares: T) -> Result<usize, RelayError>
where
    A: DeltaAttrs<Share>,
    T: IntoIterator<Item = Share>,
{
    let mut received = 0;
    let mut new = 0;
    for share in shares {
        received += 1;
        if tracker.contains(&share.hash()) {
            continue;
        }
        debug!(hash = %share.hash(), previous = %share.previous_hash(), "received share");
        tracker.add(share)?;
        new += 1;
    }

    if received > NOISY_BATCH {
        info!(received, new, have = tracker.len(), "processed shares");
    }
    Ok(new)
}

/// Filters announced hashes down to those worth requesting.
pub fn unknown_hashes<A>(tracker: &Tracker<Share, A>, hashes: &[ShareHash]) -> Vec<ShareHash>
where
    A: DeltaAttrs<Share>,
{
    hashes
        .iter()
        .filter(|hash| !tracker.contains(hash))
        .copied()
        .collect()
}
