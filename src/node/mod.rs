//! Node module - in-memory chain, transaction pool and block assembly
//! backing the miner

mod assembler;
mod chain;
mod mempool;

pub use assembler::*;
pub use chain::*;
pub use mempool::*;
