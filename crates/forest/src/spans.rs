//! Shared memo storage for deltas to the bottom of a chain.
//!
//! Every cached item stores its delta relative to a span anchored at the chain's tail. When
//! the bottom item of a chain is dropped, only the anchor changes; members stay untouched.

use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    hash::Hash,
};

use crate::{
    delta::{AttrGroup, AttributeDelta, Delta},
    error::ForestError,
};

type Result<T, Id> = std::result::Result<T, ForestError<Id>>;

#[derive(Debug)]
struct Span<Id, A> {
    /// Runs from the first anchor down to the current tail.
    delta: AttributeDelta<Id, A>,
    members: HashSet<Id>,
}

/// Arena of reference-counted spans keyed by their current tail.
#[derive(Debug)]
pub(crate) struct SpanArena<Id, A> {
    slots: Vec<Option<Span<Id, A>>>,
    free: Vec<usize>,
    by_tail: HashMap<Id, usize>,
    memos: HashMap<Id, (AttributeDelta<Id, A>, usize)>,
}

impl<Id, A> SpanArena<Id, A>
where
    Id: Clone + Eq + Hash + Debug,
    A: AttrGroup,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_tail: HashMap::new(),
            memos: HashMap::new(),
        }
    }

    /// Cached delta from `id` to the tail it was last resolved against.
    pub(crate) fn cached(&self, id: &Id) -> Result<Option<AttributeDelta<Id, A>>, Id> {
        let Some((relative, slot)) = self.memos.get(id) else {
            return Ok(None);
        };
        let span = self.span(*slot)?;
        relative.compose(&span.delta).map(Some)
    }

    pub(crate) fn set_cached(&mut self, id: &Id, full: AttributeDelta<Id, A>) -> Result<(), Id> {
        let slot = match self.by_tail.get(full.tail()) {
            Some(slot) => *slot,
            None => self.alloc(full.tail().clone()),
        };
        let relative = full.without_tail(&self.span(slot)?.delta)?;

        if let Some((_, previous)) = self.memos.get(id) {
            let previous = *previous;
            if previous != slot {
                self.leave(id, previous)?;
            }
        }

        self.memos.insert(id.clone(), (relative, slot));
        self.span_mut(slot)?.members.insert(id.clone());
        Ok(())
    }

    pub(crate) fn drop_cached(&mut self, id: &Id) -> Result<(), Id> {
        match self.memos.remove(id) {
            Some((_, slot)) => self.leave(id, slot),
            None => Ok(()),
        }
    }

    pub(crate) fn is_cached(&self, id: &Id) -> bool {
        self.memos.contains_key(id)
    }

    pub(crate) fn has_span_at(&self, tail: &Id) -> bool {
        self.by_tail.contains_key(tail)
    }

    /// Items whose cached delta currently ends at `tail`.
    pub(crate) fn members_at(&self, tail: &Id) -> Vec<Id> {
        self.by_tail
            .get(tail)
            .and_then(|slot| self.slots.get(*slot))
            .and_then(Option::as_ref)
            .map(|span| span.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Moves the span ending at `edge.tail()` up to end at `edge.head()`, as when the bottom
    /// item of a chain is removed.
    pub(crate) fn lift(&mut self, edge: &AttributeDelta<Id, A>) -> Result<(), Id> {
        let Some(slot) = self.by_tail.get(edge.tail()).copied() else {
            return Ok(());
        };
        if self.by_tail.contains_key(edge.head()) {
            return Err(ForestError::InvalidState("span already anchored at lifted tail"));
        }

        let span = self.span_mut(slot)?;
        span.delta = span.delta.without_tail(edge)?;
        self.by_tail.remove(edge.tail());
        self.by_tail.insert(edge.head().clone(), slot);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn span_count(&self) -> usize {
        self.by_tail.len()
    }

    #[cfg(test)]
    pub(crate) fn memo_count(&self) -> usize {
        self.memos.len()
    }

    fn alloc(&mut self, tail: Id) -> usize {
        let span = Span {
            delta: AttributeDelta::none(tail.clone()),
            members: HashSet::new(),
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(span);
                slot
            }
            None => {
                self.slots.push(Some(span));
                self.slots.len() - 1
            }
        };
        self.by_tail.insert(tail, slot);
        slot
    }

    fn leave(&mut self, id: &Id, slot: usize) -> Result<(), Id> {
        let span = self.span_mut(slot)?;
        span.members.remove(id);
        if span.members.is_empty() {
            let tail = span.delta.tail().clone();
            self.slots[slot] = None;
            self.by_tail.remove(&tail);
            self.free.push(slot);
        }
        Ok(())
    }

    fn span(&self, slot: usize) -> Result<&Span<Id, A>, Id> {
        self.slots
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(ForestError::InvalidState("memo refers to a released span"))
    }

    fn span_mut(&mut self, slot: usize) -> Result<&mut Span<Id, A>, Id> {
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or(ForestError::InvalidState("memo refers to a released span"))
    }
}
