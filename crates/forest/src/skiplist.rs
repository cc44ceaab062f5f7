//! Power-of-two jump tables over predecessor links.
//!
//! For every visited item the list lazily remembers the delta covering 1, 2, 4, ... edges
//! towards the bottom of its chain. A query walks these jumps greedily, largest first, and
//! so reaches any ancestor in O(log n) steps once the tables are warm.

use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    hash::BuildHasher,
};

use crate::{delta::Delta, error::ForestError};

type Result<T, Id> = std::result::Result<T, ForestError<Id>>;

/// Jumps above this level would cover more edges than a `u64` can count.
const MAX_LEVEL: usize = 62;

/// Provides the single-edge delta out of a tracked item.
pub trait EdgeSource<D: Delta> {
    /// Returns `None` for ids that are not tracked, i.e. chain bottoms.
    fn edge(&self, id: &D::Id) -> Option<&D>;
}

impl<D, S> EdgeSource<D> for HashMap<D::Id, D, S>
where
    D: Delta,
    S: BuildHasher,
{
    fn edge(&self, id: &D::Id) -> Option<&D> {
        self.get(id)
    }
}

/// Verdict of a query on a partial solution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Judgement {
    /// The solution overshot the target.
    TooFar,
    /// The solution is the answer.
    Exact,
    /// The target lies further down the chain.
    NotFarEnough,
}

/// A monotone search along a chain.
///
/// Applying more edges must never turn a `TooFar` solution back into anything else.
pub trait SkipQuery<D: Delta> {
    type Solution;
    type Output;

    fn initial_solution(&self, start: &D::Id) -> Self::Solution;

    /// Extends `solution` by `delta`, which covers `edges` edges.
    fn apply_delta(
        &self,
        solution: &Self::Solution,
        edges: u64,
        delta: &D,
    ) -> Result<Self::Solution, D::Id>;

    fn judge(&self, solution: &Self::Solution) -> Judgement;

    fn finalize(&self, solution: Self::Solution) -> Result<Self::Output, D::Id>;

    /// Error reported when the chain ends after `traveled` edges without an answer.
    fn exhausted(&self, start: &D::Id, traveled: u64) -> ForestError<D::Id>;
}

/// Looks up the ancestor exactly `n` edges below the start.
///
/// Resolves to the accumulated delta and the id it lands on, which may be an untracked
/// chain bottom.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DistanceQuery {
    pub n: u64,
}

impl<D: Delta> SkipQuery<D> for DistanceQuery {
    type Solution = (u64, D);
    type Output = (D, D::Id);

    fn initial_solution(&self, start: &D::Id) -> Self::Solution {
        (0, D::none(start.clone()))
    }

    fn apply_delta(
        &self,
        (traveled, acc): &Self::Solution,
        edges: u64,
        delta: &D,
    ) -> Result<Self::Solution, D::Id> {
        Ok((traveled + edges, acc.compose(delta)?))
    }

    fn judge(&self, (traveled, _): &Self::Solution) -> Judgement {
        match traveled.cmp(&self.n) {
            std::cmp::Ordering::Greater => Judgement::TooFar,
            std::cmp::Ordering::Equal => Judgement::Exact,
            std::cmp::Ordering::Less => Judgement::NotFarEnough,
        }
    }

    fn finalize(&self, (_, acc): Self::Solution) -> Result<Self::Output, D::Id> {
        let landing = acc.tail().clone();
        Ok((acc, landing))
    }

    fn exhausted(&self, start: &D::Id, traveled: u64) -> ForestError<D::Id> {
        ForestError::InsufficientChain {
            start: start.clone(),
            requested: self.n,
            available: traveled,
        }
    }
}

/// Lazily filled jump tables.
///
/// Level 0 of an item is its own edge. Level `k > 0` is only kept when it lands on a tracked
/// item, so that removing any item can find every stored jump that crosses it.
#[derive(Debug)]
pub struct SkipList<D: Delta> {
    levels: HashMap<D::Id, Vec<D>>,
    /// Landing id -> items holding a jump of level >= 1 that ends there.
    landings: HashMap<D::Id, HashSet<D::Id>>,
}

impl<D: Delta> Default for SkipList<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Delta> SkipList<D> {
    pub fn new() -> Self {
        Self {
            levels: HashMap::new(),
            landings: HashMap::new(),
        }
    }

    /// Runs `query` from `start`.
    pub fn query<S, Q>(&mut self, source: &S, start: &D::Id, query: &Q) -> Result<Q::Output, D::Id>
    where
        S: EdgeSource<D> + ?Sized,
        Q: SkipQuery<D>,
    {
        let mut solution = query.initial_solution(start);
        match query.judge(&solution) {
            Judgement::Exact => return query.finalize(solution),
            Judgement::TooFar => return Err(ForestError::InvalidState("query overshoots at start")),
            Judgement::NotFarEnough => {}
        }

        // Largest jump out of `start` that does not overshoot.
        let mut level = 0;
        while level < MAX_LEVEL {
            let Some(delta) = self.jump(source, start, level + 1)? else {
                break;
            };
            let probe = query.apply_delta(&solution, 1 << (level + 1), &delta)?;
            if query.judge(&probe) == Judgement::TooFar {
                break;
            }
            level += 1;
        }

        let mut current = start.clone();
        let mut traveled = 0u64;
        loop {
            let Some(delta) = self.jump(source, &current, level)? else {
                if level == 0 {
                    return Err(query.exhausted(start, traveled));
                }
                level -= 1;
                continue;
            };

            let edges = 1u64 << level;
            let next = query.apply_delta(&solution, edges, &delta)?;
            match query.judge(&next) {
                Judgement::Exact => return query.finalize(next),
                Judgement::NotFarEnough => {
                    solution = next;
                    traveled += edges;
                    current = delta.tail().clone();
                }
                Judgement::TooFar if level == 0 => {
                    return Err(ForestError::InvalidState("single edge overshoots query"));
                }
                Judgement::TooFar => level -= 1,
            }
        }
    }

    /// Accumulated delta over the `n` edges below `start`, and where they land.
    pub fn distance_to<S>(
        &mut self,
        source: &S,
        start: &D::Id,
        n: u64,
    ) -> Result<(D, D::Id), D::Id>
    where
        S: EdgeSource<D> + ?Sized,
    {
        self.query(source, start, &DistanceQuery { n })
    }

    /// Id `n` edges below `start`.
    pub fn nth_parent<S>(&mut self, source: &S, start: &D::Id, n: u64) -> Result<D::Id, D::Id>
    where
        S: EdgeSource<D> + ?Sized,
    {
        self.distance_to(source, start, n)
            .map(|(_, landing)| landing)
    }

    /// Drops every stored jump that starts at or lands on `id`.
    ///
    /// Jumps crossing an item always start at one of its descendants; callers forget those
    /// descendants themselves when the structure below them changes.
    pub fn forget_item(&mut self, id: &D::Id) {
        if let Some(own) = self.levels.remove(id) {
            for jump in own.iter().skip(1) {
                self.unlink(jump.tail(), id);
            }
        }

        let Some(starts) = self.landings.remove(id) else {
            return;
        };
        for start in starts {
            let Some(levels) = self.levels.get_mut(&start) else {
                continue;
            };
            let Some(cut) = levels
                .iter()
                .skip(1)
                .position(|jump| jump.tail() == id)
                .map(|pos| pos + 1)
            else {
                continue;
            };
            let dropped: Vec<D::Id> = levels
                .drain(cut..)
                .skip(1)
                .map(|jump| jump.tail().clone())
                .collect();
            for landing in dropped {
                self.unlink(&landing, &start);
            }
        }
    }

    /// Number of items with at least one stored jump.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Stored levels for `id`, for diagnostics.
    pub fn depth(&self, id: &D::Id) -> usize {
        self.levels.get(id).map_or(0, Vec::len)
    }

    fn jump<S>(&mut self, source: &S, id: &D::Id, level: usize) -> Result<Option<D>, D::Id>
    where
        S: EdgeSource<D> + ?Sized,
    {
        if let Some(jump) = self.levels.get(id).and_then(|levels| levels.get(level)) {
            return Ok(Some(jump.clone()));
        }

        if level == 0 {
            let Some(edge) = source.edge(id) else {
                return Ok(None);
            };
            let levels = self.levels.entry(id.clone()).or_default();
            if levels.is_empty() {
                levels.push(edge.clone());
            }
            return Ok(Some(edge.clone()));
        }

        let Some(lower) = self.jump(source, id, level - 1)? else {
            return Ok(None);
        };
        let Some(upper) = self.jump(source, lower.tail(), level - 1)? else {
            return Ok(None);
        };
        let combined = lower.compose(&upper)?;

        if source.edge(combined.tail()).is_some() {
            let levels = self.levels.entry(id.clone()).or_default();
            if levels.len() == level {
                levels.push(combined.clone());
                self.landings
                    .entry(combined.tail().clone())
                    .or_default()
                    .insert(id.clone());
            }
        }
        Ok(Some(combined))
    }

    fn unlink(&mut self, landing: &D::Id, start: &D::Id) {
        if let Some(starts) = self.landings.get_mut(landing) {
            starts.remove(start);
            if starts.is_empty() {
                self.landings.remove(landing);
            }
        }
    }
}
