//! Randomized checks of the tracker against a plain parent-pointer model.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use sharechain_primitives::{Share, ShareHash};
use sharechain_test_utils::arb_forest;

use crate::{Delta, ForestError, ForestItem, Tracker, Work};

/// Parent pointers with the same re-stitch rule as the tracker.
struct Model {
    parents: HashMap<ShareHash, ShareHash>,
    work: HashMap<ShareHash, u128>,
}

impl Model {
    fn new(shares: &[Share]) -> Self {
        Self {
            parents: shares.iter().map(|s| (s.hash(), s.previous_hash())).collect(),
            work: shares.iter().map(|s| (s.hash(), s.work())).collect(),
        }
    }

    fn add(&mut self, share: &Share) {
        self.parents.insert(share.hash(), share.previous_hash());
        self.work.insert(share.hash(), share.work());
    }

    fn remove(&mut self, id: &ShareHash) {
        let parent = self.parents[id];
        let children: Vec<ShareHash> = self
            .parents
            .iter()
            .filter(|(_, p)| *p == id)
            .map(|(c, _)| *c)
            .collect();
        if self.parents.contains_key(&parent) && children.len() == 1 {
            self.parents.insert(children[0], parent);
        }
        self.parents.remove(id);
        self.work.remove(id);
    }

    /// Height, last and work of `id` walking one edge at a time.
    fn walk(&self, id: &ShareHash) -> (u64, ShareHash, u128) {
        let (mut height, mut at, mut work) = (0, *id, 0);
        while let Some(parent) = self.parents.get(&at) {
            height += 1;
            work += self.work[&at];
            at = *parent;
        }
        (height, at, work)
    }

    /// Ids met walking down from `id`, starting with `id` itself and ending at its last.
    fn path(&self, id: &ShareHash) -> Vec<ShareHash> {
        let mut path = vec![*id];
        let mut at = *id;
        while let Some(parent) = self.parents.get(&at) {
            path.push(*parent);
            at = *parent;
        }
        path
    }

    fn heads(&self) -> HashSet<ShareHash> {
        let parents: HashSet<&ShareHash> = self.parents.values().collect();
        self.parents
            .keys()
            .filter(|id| !parents.contains(id))
            .copied()
            .collect()
    }
}

fn assert_matches_model(tracker: &mut Tracker<Share, Work>, model: &Model) {
    assert_eq!(tracker.len(), model.parents.len());
    for id in model.parents.keys() {
        let (height, last, work) = model.walk(id);
        assert_eq!(tracker.get_height_and_last(id).unwrap(), (height, last));
        assert_eq!(tracker.get_work(id).unwrap(), work);
    }
    let heads: HashSet<ShareHash> = tracker.heads().keys().copied().collect();
    assert_eq!(heads, model.heads());
    tracker.check_invariants();
}

/// Compares jump-table queries for every tracked id and every pair of tracked ids.
fn assert_ancestry_matches_model(tracker: &mut Tracker<Share, Work>, model: &Model) {
    let paths: HashMap<ShareHash, Vec<ShareHash>> =
        model.parents.keys().map(|id| (*id, model.path(id))).collect();

    for (id, path) in &paths {
        for (n, expected) in path.iter().enumerate() {
            assert_eq!(
                tracker.get_nth_parent_hash(id, n as u64).unwrap(),
                *expected,
                "{n}th parent of {id:?}"
            );
        }
    }

    for (descendant, path) in &paths {
        for (ancestor, ancestor_path) in &paths {
            let expected = match ancestor_path.last() == path.last() {
                false => None,
                true => Some(path.contains(ancestor)),
            };
            assert_eq!(tracker.is_child_of(ancestor, descendant).unwrap(), expected);

            match expected {
                Some(true) => {
                    let delta = tracker.get_delta(descendant, ancestor).unwrap();
                    let expected_height = path.len() - ancestor_path.len();
                    assert_eq!(delta.height(), expected_height as i64);
                }
                _ => assert!(matches!(
                    tracker.get_delta(descendant, ancestor).unwrap_err(),
                    ForestError::NotAnAncestor { .. }
                )),
            }
        }
    }
}

proptest! {
    #[test]
    fn height_matches_single_step_walk(shares in arb_forest(48)) {
        let model = Model::new(&shares);
        let mut tracker: Tracker<Share, Work> = Tracker::from_items(shares).unwrap();
        assert_matches_model(&mut tracker, &model);
    }

    #[test]
    fn edge_then_distance_equals_longer_distance(shares in arb_forest(40)) {
        let mut tracker: Tracker<Share, Work> = Tracker::from_items(shares.clone()).unwrap();

        for share in &shares {
            let id = share.hash();
            let height = tracker.get_height(&id).unwrap();
            let edge = tracker.edge(&id).cloned().unwrap();
            for n in 0..height {
                let (below, _) = tracker.distance_to(edge.tail(), n).unwrap();
                let (direct, _) = tracker.distance_to(&id, n + 1).unwrap();
                assert_eq!(edge.compose(&below).unwrap(), direct);
            }
        }
    }

    #[test]
    fn leaf_removal_order_is_irrelevant(shares in arb_forest(40)) {
        let mut forward: Tracker<Share, Work> = Tracker::from_items(shares.clone()).unwrap();
        let mut backward: Tracker<Share, Work> = Tracker::from_items(shares).unwrap();

        let mut leaves: Vec<ShareHash> = forward.heads().keys().copied().collect();
        leaves.sort();
        for id in &leaves {
            forward.remove(id).unwrap();
        }
        for id in leaves.iter().rev() {
            backward.remove(id).unwrap();
        }

        assert_eq!(forward.heads(), backward.heads());
        assert_eq!(forward.tails(), backward.tails());
        let remaining: Vec<ShareHash> = forward.items().map(ForestItem::id).collect();
        for id in &remaining {
            assert_eq!(
                forward.get_height_and_last(id).unwrap(),
                backward.get_height_and_last(id).unwrap()
            );
        }
        forward.check_invariants();
        backward.check_invariants();
    }

    #[test]
    fn random_removals_follow_model(
        shares in arb_forest(40),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..40),
        warm in any::<bool>(),
    ) {
        let mut model = Model::new(&shares);
        let mut tracker: Tracker<Share, Work> = Tracker::from_items(shares).unwrap();
        if warm {
            // fill caches and jump tables before anything moves
            let ids: Vec<ShareHash> = tracker.items().map(ForestItem::id).collect();
            for id in &ids {
                let height = tracker.get_height(id).unwrap();
                tracker.get_nth_parent_hash(id, height).unwrap();
            }
        }

        for pick in picks {
            if tracker.is_empty() {
                break;
            }
            let mut ids: Vec<ShareHash> = tracker.items().map(ForestItem::id).collect();
            ids.sort();
            let id = *pick.get(&ids);

            tracker.remove(&id).unwrap();
            model.remove(&id);
            assert_matches_model(&mut tracker, &model);
        }
    }

    #[test]
    fn ancestry_survives_interleaved_adds_and_removals(
        shares in arb_forest(16),
        ops in prop::collection::vec((any::<bool>(), any::<prop::sample::Index>()), 1..30),
        warm in any::<bool>(),
    ) {
        let mut model = Model::new(&shares);
        let mut tracker: Tracker<Share, Work> = Tracker::from_items(shares).unwrap();
        let mut detached: Vec<Share> = Vec::new();
        if warm {
            let ids: Vec<ShareHash> = tracker.items().map(ForestItem::id).collect();
            for id in &ids {
                let height = tracker.get_height(id).unwrap();
                tracker.get_nth_parent_hash(id, height).unwrap();
            }
        }

        for (readd, pick) in ops {
            if readd && !detached.is_empty() {
                detached.sort_by_key(Share::hash);
                let share = detached.remove(pick.index(detached.len()));
                model.add(&share);
                tracker.add(share).unwrap();
            } else if !tracker.is_empty() {
                let mut ids: Vec<ShareHash> = tracker.items().map(ForestItem::id).collect();
                ids.sort();
                let id = *pick.get(&ids);
                detached.push(tracker.remove(&id).unwrap());
                model.remove(&id);
            } else {
                continue;
            }

            assert_matches_model(&mut tracker, &model);
            assert_ancestry_matches_model(&mut tracker, &model);
        }
    }
}
