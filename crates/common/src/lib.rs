//! Ambient services shared by the share-chain crates.

pub mod logging;
