use std::collections::HashSet;

use sharechain_config::RelayConfig;
use sharechain_forest::{DeltaAttrs, Tracker};
use sharechain_primitives::{Share, ShareHash};
use tracing::debug;

use crate::RelayError;

/// Request for shares and up to `parents` of their ancestors each, walking down until a
/// `stops` hash is met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub hashes: Vec<ShareHash>,
    pub parents: u64,
    pub stops: Vec<ShareHash>,
}

impl ShareRequest {
    /// Asks for announced shares themselves.
    pub fn for_hashes(hashes: Vec<ShareHash>) -> Self {
        Self {
            hashes,
            parents: 0,
            stops: Vec::new(),
        }
    }

    /// Asks for a missing predecessor and a run of shares below it.
    pub fn for_parent(hash: ShareHash, config: &RelayConfig) -> Self {
        Self {
            hashes: vec![hash],
            parents: config.download_parents,
            stops: Vec::new(),
        }
    }
}

/// Answers a peer's [`ShareRequest`] from the tracker.
///
/// The ancestor count is capped so that a single response stays within
/// `max_shares_per_request` however many hashes are asked for. Unknown hashes contribute
/// nothing.
pub fn respond_to_request<A>(
    tracker: &mut Tracker<Share, A>,
    request: &ShareRequest,
    config: &RelayConfig,
) -> Result<Vec<Share>, RelayError>
where
    A: DeltaAttrs<Share>,
{
    if request.hashes.is_empty() {
        return Ok(Vec::new());
    }

    let per_hash = config.max_shares_per_request / request.hashes.len() as u64;
    let parents = request.parents.min(per_hash);
    let stops: HashSet<&ShareHash> = request.stops.iter().collect();

    let mut shares = Vec::new();
    for hash in &request.hashes {
        let len = (parents + 1).min(tracker.get_height(hash)?);
        for share in tracker.get_chain(hash, len)? {
            if stops.contains(&share.hash()) {
                break;
            }
            shares.push(share.clone());
        }
    }

    debug!(
        requested = request.hashes.len(),
        parents,
        sent = shares.len(),
        "answered share request"
    );
    Ok(shares)
}
