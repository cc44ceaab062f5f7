//! Accumulators over directed chain edges.

use std::{fmt::Debug, hash::Hash};

use crate::{
    error::ForestError,
    item::{ForestItem, WorkItem},
};

/// A commutative group of per-edge values carried by a delta.
///
/// Intermediate values may leave the range a real chain could produce (cached spans are
/// stored as differences), so implementations must be fully invertible.
pub trait AttrGroup: Clone + Debug + PartialEq {
    /// Neutral element.
    fn zero() -> Self;

    fn add(&self, other: &Self) -> Self;

    fn sub(&self, other: &Self) -> Self;
}

/// Attributes that can be extracted from a single item of type `I`.
pub trait DeltaAttrs<I: ?Sized>: AttrGroup {
    /// Returns the contribution of a single item.
    fn from_item(item: &I) -> Self;
}

impl AttrGroup for () {
    fn zero() -> Self {}

    fn add(&self, _other: &Self) -> Self {}

    fn sub(&self, _other: &Self) -> Self {}
}

impl<I: ?Sized> DeltaAttrs<I> for () {
    fn from_item(_item: &I) -> Self {}
}

/// Cumulative work along a chain.
///
/// Arithmetic wraps so that negative intermediate spans are representable; any delta that
/// describes a real chain segment holds the exact sum.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Work(pub u128);

impl AttrGroup for Work {
    fn zero() -> Self {
        Self(0)
    }

    fn add(&self, other: &Self) -> Self {
        Self(self.0.wrapping_add(other.0))
    }

    fn sub(&self, other: &Self) -> Self {
        Self(self.0.wrapping_sub(other.0))
    }
}

impl<I: WorkItem + ?Sized> DeltaAttrs<I> for Work {
    fn from_item(item: &I) -> Self {
        Self(item.work())
    }
}

/// Algebra over deltas spanning a directed run of chain edges, from `head` down to `tail`.
pub trait Delta: Clone + Debug {
    type Id: Clone + Eq + Hash + Debug;

    /// Identity delta from `id` to itself.
    fn none(id: Self::Id) -> Self;

    fn head(&self) -> &Self::Id;

    fn tail(&self) -> &Self::Id;

    /// Chains `self` (`A -> B`) with `other` (`B -> C`) into `A -> C`.
    fn compose(&self, other: &Self) -> Result<Self, ForestError<Self::Id>>;

    /// Removes `other` from `self` where both share an endpoint.
    ///
    /// With a shared head the result spans `other.tail -> self.tail`, with a shared tail it
    /// spans `self.head -> other.head`.
    fn difference(&self, other: &Self) -> Result<Self, ForestError<Self::Id>>;
}

/// Delta carrying a height and a user-supplied attribute group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeDelta<Id, A> {
    head: Id,
    tail: Id,
    height: i64,
    attrs: A,
}

impl<Id, A> AttributeDelta<Id, A>
where
    Id: Clone + Eq + Hash + Debug,
    A: AttrGroup,
{
    pub fn new(head: Id, tail: Id, height: i64, attrs: A) -> Self {
        Self {
            head,
            tail,
            height,
            attrs,
        }
    }

    /// Single-edge delta from an item to its declared predecessor.
    pub fn from_item<I>(item: &I) -> Self
    where
        I: ForestItem<Id = Id>,
        A: DeltaAttrs<I>,
    {
        Self::new(item.id(), item.previous_id(), 1, A::from_item(item))
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn attrs(&self) -> &A {
        &self.attrs
    }

    /// Same span, ending at `tail` instead. Used when a child is re-stitched past a removed
    /// predecessor and keeps its own contribution.
    pub(crate) fn retarget(&self, tail: Id) -> Self {
        Self::new(self.head.clone(), tail, self.height, self.attrs.clone())
    }

    /// Joins `self` with `rest` across one removed edge: `self` ends at the removed item,
    /// `rest` starts at its predecessor.
    pub(crate) fn stitch(&self, rest: &Self) -> Self {
        Self::new(
            self.head.clone(),
            rest.tail.clone(),
            self.height + rest.height,
            self.attrs.add(&rest.attrs),
        )
    }

    /// Strips a prefix sharing this delta's head, `other.tail -> self.tail`.
    pub(crate) fn without_head(&self, other: &Self) -> Result<Self, ForestError<Id>> {
        if self.head != other.head {
            return Err(self.mismatch("strip head of", other));
        }
        Ok(Self::new(
            other.tail.clone(),
            self.tail.clone(),
            self.height - other.height,
            self.attrs.sub(&other.attrs),
        ))
    }

    /// Strips a suffix sharing this delta's tail, `self.head -> other.head`.
    pub(crate) fn without_tail(&self, other: &Self) -> Result<Self, ForestError<Id>> {
        if self.tail != other.tail {
            return Err(self.mismatch("strip tail of", other));
        }
        Ok(Self::new(
            self.head.clone(),
            other.head.clone(),
            self.height - other.height,
            self.attrs.sub(&other.attrs),
        ))
    }

    fn mismatch(&self, op: &'static str, other: &Self) -> ForestError<Id> {
        ForestError::StructuralMismatch {
            op,
            left: (self.head.clone(), self.tail.clone()),
            right: (other.head.clone(), other.tail.clone()),
        }
    }
}

impl<Id, A> Delta for AttributeDelta<Id, A>
where
    Id: Clone + Eq + Hash + Debug,
    A: AttrGroup,
{
    type Id = Id;

    fn none(id: Id) -> Self {
        Self::new(id.clone(), id, 0, A::zero())
    }

    fn head(&self) -> &Id {
        &self.head
    }

    fn tail(&self) -> &Id {
        &self.tail
    }

    fn compose(&self, other: &Self) -> Result<Self, ForestError<Id>> {
        if self.tail != other.head {
            return Err(self.mismatch("compose", other));
        }
        Ok(Self::new(
            self.head.clone(),
            other.tail.clone(),
            self.height + other.height,
            self.attrs.add(&other.attrs),
        ))
    }

    fn difference(&self, other: &Self) -> Result<Self, ForestError<Id>> {
        if self.head == other.head {
            self.without_head(other)
        } else if self.tail == other.tail {
            self.without_tail(other)
        } else {
            Err(self.mismatch("subtract", other))
        }
    }
}
