//! Share and chain builders shared by the workspace's tests.

use proptest::{prelude::*, sample::Index};
use sharechain_primitives::{Share, ShareHash};

/// Ids at or above this base are only ever used as missing predecessors.
pub const UNKNOWN_BASE: u64 = 1 << 32;

/// Deterministic non-zero hash for a small test id.
pub fn share_hash(n: u64) -> ShareHash {
    let mut buf = [0u8; 32];
    buf[0] = 0xab;
    buf[24..].copy_from_slice(&n.to_be_bytes());
    ShareHash::new(buf)
}

/// Share `id` on top of `parent`, carrying one unit of work.
pub fn share(id: u64, parent: u64) -> Share {
    share_with_work(id, parent, 1)
}

pub fn share_with_work(id: u64, parent: u64, work: u128) -> Share {
    Share::new(share_hash(id), share_hash(parent), work)
}

/// Share `id` with no predecessor.
pub fn genesis(id: u64) -> Share {
    Share::new(share_hash(id), ShareHash::zero(), 1)
}

/// Shares `1..=len`, oldest first, where 1 is a genesis share and every other share builds
/// on the one before it.
pub fn linear_chain(len: u64) -> Vec<Share> {
    (1..=len)
        .map(|id| if id == 1 { genesis(1) } else { share(id, id - 1) })
        .collect()
}

/// Random forests of up to `max_len` shares in arrival order.
///
/// Shares are numbered `1..=len`. Each one is a genesis share, builds on a predecessor that
/// never arrives, or builds on a lower-numbered share; the result is then shuffled so that
/// children frequently arrive before their parents.
pub fn arb_forest(max_len: usize) -> impl Strategy<Value = Vec<Share>> {
    prop::collection::vec((0u8..8, any::<Index>(), 1u128..100), 1..=max_len)
        .prop_map(|picks| {
            picks
                .into_iter()
                .enumerate()
                .map(|(i, (kind, parent, work))| {
                    let id = i as u64 + 1;
                    let previous = match kind {
                        0 => ShareHash::zero(),
                        1 => share_hash(UNKNOWN_BASE + id),
                        _ if i == 0 => ShareHash::zero(),
                        _ => share_hash(parent.index(i) as u64 + 1),
                    };
                    Share::new(share_hash(id), previous, work)
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_share_hash_is_distinct_and_nonzero() {
        let hashes: HashSet<ShareHash> = (0..100).map(share_hash).collect();
        assert_eq!(hashes.len(), 100);
        assert!(!share_hash(0).is_zero());
    }

    #[test]
    fn test_linear_chain_links() {
        let chain = linear_chain(3);
        assert!(chain[0].is_genesis());
        assert_eq!(chain[2].previous_hash(), share_hash(2));
    }

    proptest! {
        #[test]
        fn arb_forest_parents_are_lower_or_missing(shares in arb_forest(30)) {
            let ids: HashSet<ShareHash> = shares.iter().map(Share::hash).collect();
            prop_assert_eq!(ids.len(), shares.len());
            for share in &shares {
                let previous = share.previous_hash();
                prop_assert!(previous != share.hash());
                prop_assert!(
                    previous.is_zero()
                        || ids.contains(&previous)
                        || previous.as_bytes()[24..] >= UNKNOWN_BASE.to_be_bytes()[..]
                );
            }
        }
    }
}
