//! Share exchange helpers sitting between the peer protocol and the share tracker.
//!
//! Nothing here touches the network: callers decode peer messages, hand the contents to
//! these functions and encode whatever comes back.

mod broadcast;
mod ingest;
mod request;

pub use broadcast::{broadcast_batch, KnownShares};
pub use ingest::{ingest_shares, unknown_hashes};
pub use request::{respond_to_request, ShareRequest};
use sharechain_forest::ForestError;
use sharechain_primitives::ShareHash;

/// Errors surfaced by the tracker while relaying.
pub type RelayError = ForestError<ShareHash>;
