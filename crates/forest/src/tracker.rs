use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    iter::FusedIterator,
};

use tracing::{debug, trace, warn};

use crate::{
    delta::{AttrGroup, AttributeDelta, Delta, DeltaAttrs, Work},
    error::ForestError,
    event::Event,
    item::{ForestItem, WorkItem},
    skiplist::SkipList,
    spans::SpanArena,
};

type Result<T, Id> = std::result::Result<T, ForestError<Id>>;

/// How the descendants of a removed item are reattached.
#[derive(Debug)]
enum Detach<Id> {
    /// Every child subtree becomes its own segment bottoming out at the removed id.
    Split,
    /// The only child is linked straight to the removed item's predecessor.
    Restitch { child: Id },
}

/// Tracks a forest of chains of items.
///
/// Every item points at one predecessor. Items whose predecessor is not tracked bottom out
/// at that predecessor id (the chain's *last*), and items nothing points at are *heads*.
/// Items can arrive in any order; an item whose id some chain already bottoms out at merges
/// the two.
///
/// Queries that resolve deltas update internal caches and therefore take `&mut self`.
/// Share a tracker between tasks behind a lock.
pub struct Tracker<I: ForestItem, A: DeltaAttrs<I> = ()> {
    items: HashMap<I::Id, I>,
    /// Effective edge of every item. Differs from the item's own link only after its
    /// predecessor was removed from the middle of a chain.
    edges: HashMap<I::Id, AttributeDelta<I::Id, A>>,
    /// Predecessor -> items whose effective edge ends there.
    reverse: HashMap<I::Id, HashSet<I::Id>>,
    /// Head -> last.
    heads: HashMap<I::Id, I::Id>,
    /// Last -> heads.
    tails: HashMap<I::Id, HashSet<I::Id>>,
    spans: SpanArena<I::Id, A>,
    skips: SkipList<AttributeDelta<I::Id, A>>,
    added: Event<I>,
    removed: Event<I>,
}

impl<I, A> Default for Tracker<I, A>
where
    I: ForestItem,
    A: DeltaAttrs<I>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, A> Tracker<I, A>
where
    I: ForestItem,
    A: DeltaAttrs<I>,
{
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            edges: HashMap::new(),
            reverse: HashMap::new(),
            heads: HashMap::new(),
            tails: HashMap::new(),
            spans: SpanArena::new(),
            skips: SkipList::new(),
            added: Event::new("added"),
            removed: Event::new("removed"),
        }
    }

    /// Builds a tracker from items in any order.
    pub fn from_items<T>(items: T) -> Result<Self, I::Id>
    where
        T: IntoIterator<Item = I>,
    {
        let mut tracker = Self::new();
        for item in items {
            tracker.add(item)?;
        }
        Ok(tracker)
    }

    /// Inserts an item, extending, bridging or starting a chain.
    pub fn add(&mut self, item: I) -> Result<(), I::Id> {
        let edge = AttributeDelta::from_item(&item);
        let id = edge.head().clone();
        let tail = edge.tail().clone();

        if self.items.contains_key(&id) {
            return Err(ForestError::DuplicateItem(id));
        }

        let last = match self.heads.get(&tail) {
            Some(last) => last.clone(),
            None => self.get_last(&tail)?,
        };
        if last == id {
            return Err(ForestError::InvalidState("item would close a cycle"));
        }

        self.heads.remove(&tail);
        let new_heads = self
            .tails
            .remove(&id)
            .unwrap_or_else(|| HashSet::from([id.clone()]));
        for head in &new_heads {
            self.heads.insert(head.clone(), last.clone());
        }

        let bucket = self.tails.entry(last.clone()).or_default();
        bucket.remove(&tail);
        bucket.extend(new_heads);

        self.reverse
            .entry(tail.clone())
            .or_default()
            .insert(id.clone());
        self.edges.insert(id.clone(), edge);
        self.items.insert(id.clone(), item);

        debug!(?id, ?tail, ?last, "added item");
        if let Some(item) = self.items.get(&id) {
            self.added.happened(item);
        }
        Ok(())
    }

    /// Removes an item, keeping every remaining chain consistent.
    ///
    /// - A head is dropped; its predecessor becomes a head if nothing else points at it.
    /// - A bottom item is dropped and its descendants bottom out at its id.
    /// - A mid-chain item with one child is bypassed: the child links to its predecessor.
    /// - A branch point splits: every child subtree bottoms out at its id.
    pub fn remove(&mut self, id: &I::Id) -> Result<I, I::Id> {
        let edge = self
            .edges
            .get(id)
            .cloned()
            .ok_or_else(|| ForestError::UnknownItem(id.clone()))?;
        let tail = edge.tail().clone();
        let tail_tracked = self.items.contains_key(&tail);
        let only_child = self.reverse.get(&tail).is_some_and(|c| c.len() == 1);
        let children: Vec<I::Id> = self
            .reverse
            .get(id)
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default();

        if let Some(last) = self.heads.remove(id) {
            self.detach_head(id, &tail, last, tail_tracked && only_child)?;
        } else if !tail_tracked && only_child {
            self.lift_bottom(&edge)?;
        } else {
            let mode = match children.as_slice() {
                [child] if tail_tracked => Detach::Restitch {
                    child: child.clone(),
                },
                _ => Detach::Split,
            };
            self.detach_subtree(&edge, mode, tail_tracked && only_child)?;
        }

        self.spans.drop_cached(id)?;
        self.skips.forget_item(id);
        self.edges.remove(id);
        if let Some(siblings) = self.reverse.get_mut(&tail) {
            siblings.remove(id);
            if siblings.is_empty() {
                self.reverse.remove(&tail);
            }
        }
        let item = self
            .items
            .remove(id)
            .ok_or(ForestError::InvalidState("edge without item"))?;

        debug!(?id, ?tail, children = children.len(), "removed item");
        self.removed.happened(&item);
        Ok(item)
    }

    fn detach_head(
        &mut self,
        id: &I::Id,
        tail: &I::Id,
        last: I::Id,
        promote_tail: bool,
    ) -> Result<(), I::Id> {
        let bucket = self
            .tails
            .get_mut(&last)
            .ok_or(ForestError::InvalidState("head bottoms out at unrecorded tail"))?;
        bucket.remove(id);
        if promote_tail {
            bucket.insert(tail.clone());
            self.heads.insert(tail.clone(), last.clone());
        }
        if bucket.is_empty() {
            self.tails.remove(&last);
        }
        Ok(())
    }

    /// Drops the bottom item of a chain that it alone continues.
    ///
    /// The whole chain now bottoms out at the removed id, so the span anchored at the old
    /// tail is lifted by one edge and every member stays valid.
    fn lift_bottom(&mut self, edge: &AttributeDelta<I::Id, A>) -> Result<(), I::Id> {
        let id = edge.head();
        let tail = edge.tail();

        if self.spans.has_span_at(tail) && self.spans.has_span_at(id) {
            // Items resolved while `id` was untracked; fold them into the lower span first.
            for member in self.spans.members_at(id) {
                self.get_delta_to_last(&member)?;
            }
            if self.spans.has_span_at(id) {
                return Err(ForestError::InvalidState(
                    "span at removed bottom survived flattening",
                ));
            }
        }

        let heads = self.tails.remove(tail).unwrap_or_default();
        for head in &heads {
            self.heads.insert(head.clone(), id.clone());
        }
        self.tails.insert(id.clone(), heads);

        self.spans.lift(edge)?;
        trace!(?id, ?tail, "lifted bottom span");
        Ok(())
    }

    fn detach_subtree(
        &mut self,
        edge: &AttributeDelta<I::Id, A>,
        mode: Detach<I::Id>,
        promote_tail: bool,
    ) -> Result<(), I::Id> {
        let id = edge.head().clone();
        let tail = edge.tail().clone();

        let to_last = self.get_delta_to_last(&id)?;
        let last = to_last.tail().clone();
        let below = match &mode {
            Detach::Split => None,
            Detach::Restitch { .. } => Some(to_last.without_head(edge)?),
        };

        let subtree = self.descendants(&id);
        let cached: Vec<I::Id> = subtree
            .iter()
            .filter(|member| self.spans.is_cached(*member))
            .cloned()
            .collect();

        let mut migrated = Vec::with_capacity(cached.len());
        for member in cached {
            let full = self.get_delta_to_last(&member)?;
            let to_removed = full.without_tail(&to_last)?;
            let target = match &below {
                Some(below) => to_removed.stitch(below),
                None => to_removed,
            };
            migrated.push((member, target));
        }

        for member in &subtree {
            self.spans.drop_cached(member)?;
            self.skips.forget_item(member);
        }

        match mode {
            Detach::Split => {
                let moved: HashSet<I::Id> = subtree
                    .iter()
                    .filter(|member| self.heads.contains_key(*member))
                    .cloned()
                    .collect();
                for head in &moved {
                    self.heads.insert(head.clone(), id.clone());
                }
                if let Some(bucket) = self.tails.get_mut(&last) {
                    bucket.retain(|head| !moved.contains(head));
                    if promote_tail {
                        bucket.insert(tail.clone());
                    }
                    if bucket.is_empty() {
                        self.tails.remove(&last);
                    }
                }
                if promote_tail {
                    self.heads.insert(tail.clone(), last.clone());
                }
                self.tails.insert(id.clone(), moved);
                debug!(?id, ?last, descendants = subtree.len(), "split chain at removed item");
            }
            Detach::Restitch { child } => {
                let child_edge = self
                    .edges
                    .get_mut(&child)
                    .ok_or(ForestError::InvalidState("child without edge"))?;
                *child_edge = child_edge.retarget(tail.clone());
                self.reverse.remove(&id);
                self.reverse
                    .entry(tail.clone())
                    .or_default()
                    .insert(child.clone());
                warn!(?id, ?child, ?tail, "re-stitched child past removed item");
            }
        }

        for (member, delta) in migrated {
            trace!(?member, tail = ?delta.tail(), "migrated cached delta");
            self.spans.set_cached(&member, delta)?;
        }
        Ok(())
    }

    fn descendants(&self, id: &I::Id) -> Vec<I::Id> {
        let mut out = Vec::new();
        let mut queue: VecDeque<I::Id> = self
            .reverse
            .get(id)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        while let Some(next) = queue.pop_front() {
            if let Some(children) = self.reverse.get(&next) {
                queue.extend(children.iter().cloned());
            }
            out.push(next);
        }
        out
    }

    /// Delta from `id` to the bottom of its chain. Untracked ids yield the identity delta.
    pub fn get_delta_to_last(&mut self, id: &I::Id) -> Result<AttributeDelta<I::Id, A>, I::Id> {
        let mut delta = AttributeDelta::none(id.clone());
        let mut visited = Vec::new();

        while self.items.contains_key(delta.tail()) {
            let at = delta.tail().clone();
            let step = match self.spans.cached(&at)? {
                Some(step) => step,
                None => self
                    .edges
                    .get(&at)
                    .cloned()
                    .ok_or(ForestError::InvalidState("tracked item without edge"))?,
            };
            visited.push(delta.clone());
            delta = delta.compose(&step)?;
        }

        for then in visited {
            let remaining = delta.without_head(&then)?;
            self.spans.set_cached(then.tail(), remaining)?;
        }
        Ok(delta)
    }

    pub fn get_height(&mut self, id: &I::Id) -> Result<u64, I::Id> {
        self.get_height_and_last(id).map(|(height, _)| height)
    }

    pub fn get_attrs(&mut self, id: &I::Id) -> Result<A, I::Id> {
        self.get_delta_to_last(id).map(|delta| delta.attrs().clone())
    }

    /// Untracked id the chain of `id` bottoms out at.
    pub fn get_last(&mut self, id: &I::Id) -> Result<I::Id, I::Id> {
        self.get_delta_to_last(id).map(|delta| delta.tail().clone())
    }

    pub fn get_height_and_last(&mut self, id: &I::Id) -> Result<(u64, I::Id), I::Id> {
        let delta = self.get_delta_to_last(id)?;
        let height = u64::try_from(delta.height())
            .map_err(|_| ForestError::InvalidState("negative chain height"))?;
        Ok((height, delta.tail().clone()))
    }

    /// Delta from `item` down to `ancestor`.
    pub fn get_delta(
        &mut self,
        item: &I::Id,
        ancestor: &I::Id,
    ) -> Result<AttributeDelta<I::Id, A>, I::Id> {
        if self.is_child_of(ancestor, item)? != Some(true) {
            return Err(ForestError::NotAnAncestor {
                item: item.clone(),
                ancestor: ancestor.clone(),
            });
        }
        let from_item = self.get_delta_to_last(item)?;
        let from_ancestor = self.get_delta_to_last(ancestor)?;
        from_item.without_tail(&from_ancestor)
    }

    /// Whether `ancestor` lies on the chain below `descendant`, or is `descendant` itself.
    ///
    /// Returns `None` when the two bottom out at different tails and so cannot be related
    /// with what is known.
    pub fn is_child_of(
        &mut self,
        ancestor: &I::Id,
        descendant: &I::Id,
    ) -> Result<Option<bool>, I::Id> {
        let (height, last) = self.get_height_and_last(ancestor)?;
        let (child_height, child_last) = self.get_height_and_last(descendant)?;
        if last != child_last {
            return Ok(None);
        }
        let Some(up) = child_height.checked_sub(height) else {
            return Ok(Some(false));
        };
        let found = self.get_nth_parent_hash(descendant, up)?;
        Ok(Some(&found == ancestor))
    }

    /// Id `n` edges below `start`.
    pub fn get_nth_parent_hash(&mut self, start: &I::Id, n: u64) -> Result<I::Id, I::Id> {
        self.skips.nth_parent(&self.edges, start, n)
    }

    /// Accumulated delta over the `n` edges below `start`, and the id it lands on.
    pub fn distance_to(
        &mut self,
        start: &I::Id,
        n: u64,
    ) -> Result<(AttributeDelta<I::Id, A>, I::Id), I::Id> {
        self.skips.distance_to(&self.edges, start, n)
    }

    /// Iterates `len` items walking down from `start`, newest first.
    pub fn get_chain(&mut self, start: &I::Id, len: u64) -> Result<Chain<'_, I, A>, I::Id> {
        let height = self.get_height(start)?;
        if len > height {
            return Err(ForestError::InsufficientChain {
                start: start.clone(),
                requested: len,
                available: height,
            });
        }
        Ok(Chain {
            items: &self.items,
            edges: &self.edges,
            next: Some(start.clone()),
            remaining: len,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &I::Id) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &I::Id) -> Option<&I> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &I> {
        self.items.values()
    }

    /// Head -> the tail its chain bottoms out at.
    pub fn heads(&self) -> &HashMap<I::Id, I::Id> {
        &self.heads
    }

    /// Tail -> heads bottoming out there.
    pub fn tails(&self) -> &HashMap<I::Id, HashSet<I::Id>> {
        &self.tails
    }

    /// Items whose effective predecessor is `id`. `id` need not be tracked.
    pub fn children(&self, id: &I::Id) -> Option<&HashSet<I::Id>> {
        self.reverse.get(id)
    }

    /// Effective edge out of `id`.
    pub fn edge(&self, id: &I::Id) -> Option<&AttributeDelta<I::Id, A>> {
        self.edges.get(id)
    }

    /// Effective predecessor of `id`.
    pub fn parent_of(&self, id: &I::Id) -> Option<&I::Id> {
        self.edges.get(id).map(|edge| edge.tail())
    }

    /// Fired after an item was inserted.
    pub fn added(&mut self) -> &mut Event<I> {
        &mut self.added
    }

    /// Fired after an item was removed.
    pub fn removed(&mut self) -> &mut Event<I> {
        &mut self.removed
    }
}

impl<I: WorkItem> Tracker<I, Work> {
    /// Work accumulated from `id` down to the bottom of its chain.
    pub fn get_work(&mut self, id: &I::Id) -> Result<u128, I::Id> {
        self.get_attrs(id).map(|work| work.0)
    }
}

impl<I, A> fmt::Debug for Tracker<I, A>
where
    I: ForestItem,
    A: DeltaAttrs<I>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("items", &self.items.len())
            .field("heads", &self.heads.len())
            .field("tails", &self.tails.len())
            .field("added", &self.added)
            .field("removed", &self.removed)
            .finish()
    }
}

/// Items on a chain, newest first. Created by [`Tracker::get_chain`].
pub struct Chain<'a, I: ForestItem, A> {
    items: &'a HashMap<I::Id, I>,
    edges: &'a HashMap<I::Id, AttributeDelta<I::Id, A>>,
    next: Option<I::Id>,
    remaining: u64,
}

impl<'a, I: ForestItem, A: AttrGroup> Iterator for Chain<'a, I, A> {
    type Item = &'a I;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.next.take()?;
        let item = self.items.get(&id)?;
        self.next = self.edges.get(&id).map(|edge| edge.tail().clone());
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl<I: ForestItem, A: AttrGroup> ExactSizeIterator for Chain<'_, I, A> {}

impl<I: ForestItem, A: AttrGroup> FusedIterator for Chain<'_, I, A> {}

impl<I: ForestItem, A> fmt::Debug for Chain<'_, I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("next", &self.next)
            .field("remaining", &self.remaining)
            .finish()
    }
}

#[cfg(test)]
impl<I, A> Tracker<I, A>
where
    I: ForestItem,
    A: DeltaAttrs<I>,
{
    /// Walks every chain one edge at a time and compares against the indices and caches.
    pub(crate) fn check_invariants(&mut self) {
        let ids: Vec<I::Id> = self.items.keys().cloned().collect();
        let mut expected_tails: HashMap<I::Id, HashSet<I::Id>> = HashMap::new();

        for id in &ids {
            let (height, last) = self.walk_to_last(id);
            assert_eq!(
                self.get_height_and_last(id).unwrap(),
                (height, last.clone()),
                "cached height of {id:?}"
            );

            let is_head = self.reverse.get(id).is_none_or(HashSet::is_empty);
            assert_eq!(self.heads.get(id), is_head.then_some(&last), "head {id:?}");
            if is_head {
                expected_tails.entry(last).or_default().insert(id.clone());
            }

            let tail = self.edges[id].tail();
            assert!(self.reverse[tail].contains(id), "reverse of {id:?}");
        }

        assert_eq!(self.heads.len(), expected_tails.values().map(HashSet::len).sum::<usize>());
        assert_eq!(self.tails, expected_tails);
        assert_eq!(
            self.reverse.values().map(HashSet::len).sum::<usize>(),
            self.items.len()
        );
        assert!(self.reverse.values().all(|c| !c.is_empty()));
    }

    fn walk_to_last(&self, id: &I::Id) -> (u64, I::Id) {
        let mut height = 0;
        let mut at = id.clone();
        while let Some(edge) = self.edges.get(&at) {
            height += 1;
            at = edge.tail().clone();
        }
        (height, at)
    }

    pub(crate) fn span_count(&self) -> usize {
        self.spans.span_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use sharechain_primitives::{Share, ShareHash};
    use sharechain_test_utils::{genesis, linear_chain, share, share_hash, share_with_work};

    use super::*;

    type WorkTracker = Tracker<Share, Work>;

    fn h(n: u64) -> ShareHash {
        share_hash(n)
    }

    /// A(1, genesis) <- B(2) <- C(3) <- D(4)
    fn four_chain() -> WorkTracker {
        Tracker::from_items([
            share_with_work(4, 3, 8),
            share_with_work(3, 2, 4),
            share_with_work(2, 1, 2),
            genesis(1),
        ])
        .unwrap()
    }

    #[test]
    fn test_merge_out_of_order() {
        let mut tracker: Tracker<Share> = Tracker::new();
        tracker.add(share(3, 2)).unwrap();
        tracker.add(genesis(1)).unwrap();
        assert_eq!(tracker.tails().len(), 2);

        tracker.add(share(2, 1)).unwrap();

        assert_eq!(tracker.heads().len(), 1);
        assert_eq!(tracker.heads()[&h(3)], ShareHash::zero());
        assert_eq!(tracker.tails()[&ShareHash::zero()], HashSet::from([h(3)]));
        assert_eq!(tracker.get_height(&h(3)).unwrap(), 3);
        assert_eq!(tracker.get_delta(&h(3), &h(1)).unwrap().height(), 2);
        assert_eq!(tracker.get_last(&h(3)).unwrap(), ShareHash::zero());
        tracker.check_invariants();
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut tracker = four_chain();
        assert_eq!(
            tracker.add(share(2, 1)).unwrap_err(),
            ForestError::DuplicateItem(h(2))
        );
        assert_eq!(
            tracker.remove(&h(9)).unwrap_err(),
            ForestError::UnknownItem(h(9))
        );
        assert_eq!(tracker.len(), 4);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut tracker: Tracker<Share> = Tracker::new();
        tracker.add(share(1, 2)).unwrap();
        let err = tracker.add(share(2, 1)).unwrap_err();
        assert!(matches!(err, ForestError::InvalidState(_)));
        assert_eq!(tracker.len(), 1);
        tracker.check_invariants();
    }

    #[test]
    fn test_work_and_height() {
        let mut tracker = four_chain();
        assert_eq!(tracker.get_height(&h(4)).unwrap(), 4);
        // genesis carries one unit of work
        assert_eq!(tracker.get_work(&h(4)).unwrap(), 15);
        assert_eq!(tracker.get_work(&h(2)).unwrap(), 3);
        assert_eq!(tracker.get_delta(&h(4), &h(2)).unwrap().attrs(), &Work(12));
    }

    #[test]
    fn test_untracked_hash_is_empty_chain() {
        let mut tracker = four_chain();
        let unknown = h(42);
        assert_eq!(tracker.get_height_and_last(&unknown).unwrap(), (0, unknown));
        assert_eq!(tracker.get_chain(&unknown, 0).unwrap().count(), 0);
        assert_eq!(tracker.is_child_of(&unknown, &unknown).unwrap(), Some(true));
    }

    #[test]
    fn test_remove_mid_chain_restitches() {
        let mut tracker = four_chain();
        tracker.get_height(&h(4)).unwrap();
        tracker.get_nth_parent_hash(&h(4), 3).unwrap();

        let removed = tracker.remove(&h(3)).unwrap();
        assert_eq!(removed.hash(), h(3));

        assert_eq!(tracker.get_last(&h(4)).unwrap(), tracker.get_last(&h(2)).unwrap());
        assert_eq!(tracker.is_child_of(&h(2), &h(4)).unwrap(), Some(true));
        assert_eq!(tracker.get_delta(&h(4), &h(2)).unwrap().height(), 1);
        assert_eq!(tracker.get_height(&h(4)).unwrap(), 3);
        assert_eq!(tracker.get_work(&h(4)).unwrap(), 11);
        assert_eq!(tracker.parent_of(&h(4)), Some(&h(2)));
        assert_eq!(tracker.get_nth_parent_hash(&h(4), 2).unwrap(), h(1));

        let chain: Vec<ShareHash> = tracker
            .get_chain(&h(4), 3)
            .unwrap()
            .map(Share::hash)
            .collect();
        assert_eq!(chain, vec![h(4), h(2), h(1)]);
        tracker.check_invariants();
    }

    #[test]
    fn test_remove_branch_point_splits() {
        // 1 <- 2 <- {3, 4}, 4 <- 5
        let mut tracker: Tracker<Share> = Tracker::from_items([
            genesis(1),
            share(2, 1),
            share(3, 2),
            share(4, 2),
            share(5, 4),
        ])
        .unwrap();
        tracker.get_height(&h(5)).unwrap();
        tracker.get_height(&h(3)).unwrap();

        tracker.remove(&h(2)).unwrap();

        assert_eq!(tracker.get_height_and_last(&h(3)).unwrap(), (1, h(2)));
        assert_eq!(tracker.get_height_and_last(&h(5)).unwrap(), (2, h(2)));
        assert_eq!(tracker.tails()[&h(2)], HashSet::from([h(3), h(5)]));
        assert_eq!(tracker.heads()[&h(1)], ShareHash::zero());
        assert_eq!(tracker.is_child_of(&h(1), &h(5)).unwrap(), None);
        assert_eq!(tracker.is_child_of(&h(4), &h(5)).unwrap(), Some(true));
        tracker.check_invariants();
    }

    #[test]
    fn test_remove_bottom_with_sibling_splits() {
        // 1 <- {2, 3}, 2 <- 4; both 1 and 3 are siblings under the genesis tail
        let mut tracker: Tracker<Share> = Tracker::from_items([
            genesis(1),
            genesis(3),
            share(2, 1),
            share(4, 2),
        ])
        .unwrap();
        tracker.get_height(&h(4)).unwrap();

        tracker.remove(&h(1)).unwrap();

        assert_eq!(tracker.get_height_and_last(&h(4)).unwrap(), (2, h(1)));
        assert_eq!(tracker.tails()[&ShareHash::zero()], HashSet::from([h(3)]));
        tracker.check_invariants();
    }

    #[test]
    fn test_remove_bottom_lifts_span() {
        let mut tracker: Tracker<Share> = Tracker::from_items(linear_chain(10)).unwrap();
        assert_eq!(tracker.get_height(&h(10)).unwrap(), 10);
        tracker.get_height(&h(5)).unwrap();
        let spans = tracker.span_count();

        tracker.remove(&h(1)).unwrap();
        tracker.remove(&h(2)).unwrap();

        assert_eq!(tracker.span_count(), spans);
        assert_eq!(tracker.get_height_and_last(&h(10)).unwrap(), (8, h(2)));
        assert_eq!(tracker.get_height(&h(5)).unwrap(), 3);
        assert_eq!(tracker.heads()[&h(10)], h(2));
        tracker.check_invariants();
    }

    #[test]
    fn test_remove_bottom_flattens_upper_span() {
        let mut tracker: Tracker<Share> = Tracker::new();
        for id in 2..=5 {
            tracker.add(share(id, id - 1)).unwrap();
        }
        // resolved while 1 was unknown
        assert_eq!(tracker.get_height_and_last(&h(5)).unwrap(), (4, h(1)));

        tracker.add(genesis(1)).unwrap();
        assert_eq!(tracker.get_height(&h(1)).unwrap(), 1);

        tracker.remove(&h(1)).unwrap();

        assert_eq!(tracker.get_height_and_last(&h(5)).unwrap(), (4, h(1)));
        assert_eq!(tracker.get_height_and_last(&h(3)).unwrap(), (2, h(1)));
        tracker.check_invariants();
    }

    #[test]
    fn test_remove_head_promotes_tail() {
        let mut tracker: Tracker<Share> = Tracker::from_items(linear_chain(3)).unwrap();
        tracker.remove(&h(3)).unwrap();
        assert_eq!(tracker.heads()[&h(2)], ShareHash::zero());
        assert_eq!(tracker.tails()[&ShareHash::zero()], HashSet::from([h(2)]));

        // a head with a sibling leaves its parent alone
        tracker.add(share(3, 1)).unwrap();
        tracker.remove(&h(3)).unwrap();
        assert!(!tracker.heads().contains_key(&h(1)));
        tracker.check_invariants();

        tracker.remove(&h(2)).unwrap();
        tracker.remove(&h(1)).unwrap();
        assert!(tracker.is_empty());
        assert!(tracker.heads().is_empty());
        assert!(tracker.tails().is_empty());
        assert!(tracker.children(&ShareHash::zero()).is_none());
    }

    #[test]
    fn test_is_child_of_unknown_across_tails() {
        let mut tracker: Tracker<Share> =
            Tracker::from_items([genesis(1), share(2, 1), share(11, 10), share(12, 11)])
                .unwrap();
        assert_eq!(tracker.is_child_of(&h(1), &h(12)).unwrap(), None);
        assert_eq!(tracker.is_child_of(&h(11), &h(12)).unwrap(), Some(true));
        assert_eq!(tracker.is_child_of(&h(12), &h(11)).unwrap(), Some(false));
    }

    #[test]
    fn test_is_child_of_on_forked_chain() {
        // 1 <- 2 <- 3 and 1 <- 4 <- 5
        let mut tracker: Tracker<Share> = Tracker::from_items([
            genesis(1),
            share(2, 1),
            share(3, 2),
            share(4, 1),
            share(5, 4),
        ])
        .unwrap();
        assert_eq!(tracker.is_child_of(&h(2), &h(5)).unwrap(), Some(false));
        assert_eq!(tracker.is_child_of(&h(1), &h(5)).unwrap(), Some(true));
        assert_eq!(
            tracker.get_delta(&h(5), &h(2)).unwrap_err(),
            ForestError::NotAnAncestor {
                item: h(5),
                ancestor: h(2),
            }
        );
    }

    #[test]
    fn test_get_chain_insufficient_after_removal() {
        let mut tracker = four_chain();
        assert_eq!(tracker.get_chain(&h(4), 3).unwrap().len(), 3);

        tracker.remove(&h(1)).unwrap();
        assert_eq!(tracker.get_chain(&h(4), 3).unwrap().count(), 3);

        tracker.remove(&h(2)).unwrap();
        let err = tracker.get_chain(&h(4), 3).unwrap_err();
        assert_eq!(
            err,
            ForestError::InsufficientChain {
                start: h(4),
                requested: 3,
                available: 2,
            }
        );
    }

    #[test]
    fn test_chain_walks_newest_first_and_stays_exhausted() {
        let mut plain: Tracker<Share> = Tracker::from_items(linear_chain(5)).unwrap();
        let mut chain = plain.get_chain(&h(5), 3).unwrap();
        assert_eq!(chain.len(), 3);
        let walked: Vec<ShareHash> = chain.by_ref().map(Share::hash).collect();
        assert_eq!(walked, vec![h(5), h(4), h(3)]);
        assert_eq!(chain.len(), 0);
        assert!(chain.next().is_none());
        assert!(chain.next().is_none());

        let mut weighted = four_chain();
        let work: u128 = weighted.get_chain(&h(4), 4).unwrap().map(Share::work).sum();
        assert_eq!(work, weighted.get_work(&h(4)).unwrap());
    }

    #[test]
    fn test_nth_parent_and_distance() {
        let mut tracker: Tracker<Share, Work> = Tracker::from_items(linear_chain(64)).unwrap();
        assert_eq!(tracker.get_nth_parent_hash(&h(64), 63).unwrap(), h(1));
        assert_eq!(tracker.get_nth_parent_hash(&h(64), 64).unwrap(), ShareHash::zero());

        let (delta, landing) = tracker.distance_to(&h(50), 20).unwrap();
        assert_eq!(landing, h(30));
        assert_eq!(delta.height(), 20);
        assert_eq!(delta.attrs(), &Work(20));

        assert!(matches!(
            tracker.get_nth_parent_hash(&h(10), 11).unwrap_err(),
            ForestError::InsufficientChain { available: 10, .. }
        ));
    }

    #[test]
    fn test_readded_item_becomes_sibling() {
        let mut tracker = four_chain();
        let removed = tracker.remove(&h(3)).unwrap();
        tracker.add(removed).unwrap();

        assert_eq!(tracker.parent_of(&h(4)), Some(&h(2)));
        assert_eq!(tracker.children(&h(2)), Some(&HashSet::from([h(3), h(4)])));
        assert_eq!(tracker.get_height(&h(3)).unwrap(), 3);
        tracker.check_invariants();
    }

    #[test]
    fn test_events_fire_after_mutation() {
        let mut tracker: Tracker<Share> = Tracker::new();
        let added = Arc::new(AtomicUsize::new(0));
        let removed = Arc::new(AtomicUsize::new(0));

        let counter = added.clone();
        tracker.added().watch(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        tracker.removed().watch(|_| Err(eyre::eyre!("observer broke")));
        let counter = removed.clone();
        tracker.removed().watch(move |share: &Share| {
            assert_eq!(share.hash(), share_hash(2));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        for share in linear_chain(3) {
            tracker.add(share).unwrap();
        }
        tracker.remove(&h(2)).unwrap();

        assert_eq!(added.load(Ordering::SeqCst), 3);
        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.removed().times(), 1);
        assert_eq!(tracker.len(), 2);
    }
}
