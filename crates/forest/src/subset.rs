//! A tracker restricted to items of another tracker.

use std::collections::{HashMap, HashSet};

use crate::{
    delta::{AttributeDelta, DeltaAttrs, Work},
    error::ForestError,
    event::Event,
    item::{ForestItem, WorkItem},
    tracker::{Chain, Tracker},
};

type Result<T, Id> = std::result::Result<T, ForestError<Id>>;

/// Tracks a subset of the items known to a superset tracker, e.g. the verified shares out of
/// all received ones.
///
/// Membership is checked against the superset passed to each mutation. Callers remove items
/// here before removing them from the superset.
#[derive(Debug)]
pub struct SubsetTracker<I: ForestItem, A: DeltaAttrs<I> = ()> {
    inner: Tracker<I, A>,
}

impl<I, A> Default for SubsetTracker<I, A>
where
    I: ForestItem,
    A: DeltaAttrs<I>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, A> SubsetTracker<I, A>
where
    I: ForestItem,
    A: DeltaAttrs<I>,
{
    pub fn new() -> Self {
        Self {
            inner: Tracker::new(),
        }
    }

    pub fn add<B>(&mut self, item: I, superset: &Tracker<I, B>) -> Result<(), I::Id>
    where
        B: DeltaAttrs<I>,
    {
        let id = item.id();
        if !superset.contains(&id) {
            return Err(ForestError::NotInSuperset(id));
        }
        self.inner.add(item)
    }

    pub fn remove<B>(&mut self, id: &I::Id, superset: &Tracker<I, B>) -> Result<I, I::Id>
    where
        B: DeltaAttrs<I>,
    {
        if !superset.contains(id) {
            return Err(ForestError::NotInSuperset(id.clone()));
        }
        self.inner.remove(id)
    }

    /// Read-only view of the underlying tracker.
    pub fn tracker(&self) -> &Tracker<I, A> {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, id: &I::Id) -> bool {
        self.inner.contains(id)
    }

    pub fn heads(&self) -> &HashMap<I::Id, I::Id> {
        self.inner.heads()
    }

    pub fn tails(&self) -> &HashMap<I::Id, HashSet<I::Id>> {
        self.inner.tails()
    }

    pub fn get_delta_to_last(&mut self, id: &I::Id) -> Result<AttributeDelta<I::Id, A>, I::Id> {
        self.inner.get_delta_to_last(id)
    }

    pub fn get_height(&mut self, id: &I::Id) -> Result<u64, I::Id> {
        self.inner.get_height(id)
    }

    pub fn get_last(&mut self, id: &I::Id) -> Result<I::Id, I::Id> {
        self.inner.get_last(id)
    }

    pub fn get_height_and_last(&mut self, id: &I::Id) -> Result<(u64, I::Id), I::Id> {
        self.inner.get_height_and_last(id)
    }

    pub fn get_delta(
        &mut self,
        item: &I::Id,
        ancestor: &I::Id,
    ) -> Result<AttributeDelta<I::Id, A>, I::Id> {
        self.inner.get_delta(item, ancestor)
    }

    pub fn is_child_of(
        &mut self,
        ancestor: &I::Id,
        descendant: &I::Id,
    ) -> Result<Option<bool>, I::Id> {
        self.inner.is_child_of(ancestor, descendant)
    }

    pub fn get_nth_parent_hash(&mut self, start: &I::Id, n: u64) -> Result<I::Id, I::Id> {
        self.inner.get_nth_parent_hash(start, n)
    }

    pub fn get_chain(&mut self, start: &I::Id, len: u64) -> Result<Chain<'_, I, A>, I::Id> {
        self.inner.get_chain(start, len)
    }

    pub fn added(&mut self) -> &mut Event<I> {
        self.inner.added()
    }

    pub fn removed(&mut self) -> &mut Event<I> {
        self.inner.removed()
    }
}

impl<I: WorkItem> SubsetTracker<I, Work> {
    pub fn get_work(&mut self, id: &I::Id) -> Result<u128, I::Id> {
        self.inner.get_work(id)
    }
}
