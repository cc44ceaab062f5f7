//! Identifiers and share summaries that the rest of the workspace is generic over.

#[macro_use]
mod macros;

mod hash;
mod share;

pub use hash::ShareHash;
pub use share::Share;
