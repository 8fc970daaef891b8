//! Alpha Core Library
//!
//! Consensus parameters for the Bitcoin, Scash and Alpha network families,
//! signet block authorization with a height-gated alternate challenge, and
//! a parallel block miner.

pub mod chainparams;
pub mod consensus;
pub mod crypto;
pub mod mining;
pub mod node;
pub mod script;
pub mod validation;

/// Base units per coin
pub const COIN: u64 = 100_000_000;
