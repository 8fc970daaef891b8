//! Mining module - parallel block production against a shared chain tip

mod config;
mod interfaces;
mod miner;

pub use config::*;
pub use interfaces::*;
pub use miner::*;
