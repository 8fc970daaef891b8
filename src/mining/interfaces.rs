//! Collaborators the miner drives
//!
//! The miner never touches chain state itself. It reads the tip through a
//! [`ChainBackend`], asks a [`BlockAssembler`] for candidates, and hands
//! solved blocks back to the backend's acceptance pipeline.

use std::sync::Arc;
use thiserror::Error;

use crate::chainparams::ChainParams;
use crate::consensus::{Block, SignetError};
use crate::crypto::Hash;
use crate::script::Script;

/// Point-in-time view of the best chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipSnapshot {
    pub hash: Hash,
    pub height: u32,
    pub time: u32,
    pub bits: u32,
}

/// A candidate block and the height it would occupy
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    pub height: u32,
}

/// Result of handing a block to the acceptance pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessOutcome {
    /// The block passed validation
    pub accepted: bool,
    /// The block became the new best tip
    pub new_block: bool,
}

/// Candidate construction failures
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Failed to sign block template: {0}")]
    Signing(#[from] SignetError),
    #[error("Coinbase value overflow")]
    ValueOverflow,
}

/// Read access to the best chain plus the acceptance pipeline
pub trait ChainBackend: Send + Sync {
    fn tip(&self) -> TipSnapshot;

    fn params(&self) -> &ChainParams;

    /// Validate and possibly connect `block`. `force_processing` asks for the
    /// block to be processed even if it was not requested; `min_pow_checked`
    /// tells the pipeline the submitter already verified the proof of work.
    fn process_new_block(
        &self,
        block: Arc<Block>,
        force_processing: bool,
        min_pow_checked: bool,
    ) -> ProcessOutcome;
}

/// Builds candidate blocks on the current tip
pub trait BlockAssembler: Send + Sync {
    /// `Ok(None)` means there is nothing to mine right now
    fn create_new_block(&self, coinbase_script: &Script) -> Result<Option<BlockTemplate>, AssembleError>;
}
