//! Indexed forest of share chains with logarithmic ancestor queries.
//!
//! The [`Tracker`] owns a set of items, each pointing at exactly one predecessor, and keeps
//! them organised as a forest of chains. It answers structural questions about those chains
//! (height, accumulated attributes, n-th ancestor, ancestry) without walking every link:
//!
//! - per-item deltas to the bottom of the chain are cached and shared between items through
//!   reference-counted spans, so repeated queries are amortized O(1);
//! - n-th ancestor lookups go through a [`SkipList`] of power-of-two jumps, O(log n).
//!
//! ```ignore
//! use sharechain_forest::{Tracker, Work};
//!
//! let mut tracker: Tracker<Share, Work> = Tracker::new();
//! tracker.add(share)?;
//!
//! let height = tracker.get_height(&share_hash)?;
//! let work = tracker.get_work(&share_hash)?;
//! let connected = tracker.is_child_of(&older_hash, &share_hash)?;
//! for share in tracker.get_chain(&share_hash, 10)? { /* newest to oldest */ }
//!
//! tracker.remove(&oldest_hash)?;
//! ```

mod delta;
mod error;
mod event;
mod item;
mod skiplist;
mod spans;
mod subset;
mod tracker;

#[cfg(test)]
mod properties;

pub use delta::{AttrGroup, AttributeDelta, Delta, DeltaAttrs, Work};
pub use error::ForestError;
pub use event::{Event, Observer, WatchId};
pub use item::{ForestItem, WorkItem};
pub use skiplist::{DistanceQuery, EdgeSource, Judgement, SkipList, SkipQuery};
pub use subset::SubsetTracker;
pub use tracker::{Chain, Tracker};
