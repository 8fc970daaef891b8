//! Consensus module - Block structure, validation, difficulty, rewards,
//! proof of work and signet authorization

mod block;
mod validation;
mod difficulty;
mod rewards;
mod pow;
mod signet;
pub mod encode;

pub use block::*;
pub use validation::*;
pub use difficulty::*;
pub use rewards::*;
pub use pow::*;
pub use signet::*;
