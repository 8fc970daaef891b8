//! Block validation
//!
//! Context-dependent checks applied by the acceptance pipeline before a
//! block extends the chain.

use crate::chainparams::ConsensusParams;
use crate::consensus::{check_block_authorization, max_coinbase_value, Block, PowPurpose, ProofOfWork};
use crate::crypto::Hash;
use crate::script::{Script, ScriptEvaluator};
use thiserror::Error;

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid proof of work")]
    InvalidPoW,
    #[error("Invalid merkle root")]
    InvalidMerkleRoot,
    #[error("Invalid previous hash")]
    InvalidPrevHash,
    #[error("Incorrect difficulty bits: expected {expected:#010x}, got {actual:#010x}")]
    InvalidDifficulty { expected: u32, actual: u32 },
    #[error("First transaction is not a coinbase")]
    MissingCoinbase,
    #[error("More than one coinbase")]
    MultipleCoinbase,
    #[error("Coinbase does not start with the block height")]
    InvalidCoinbaseHeight,
    #[error("Coinbase pays {claimed}, limit is {allowed}")]
    InvalidBlockReward { claimed: u64, allowed: u64 },
    #[error("Block signature does not satisfy the signet challenge")]
    InvalidSignetSolution,
}

/// Everything a block is checked against besides its own contents
pub struct BlockContext<'a> {
    pub params: &'a ConsensusParams,
    /// Hash of the block being extended
    pub prev_hash: Hash,
    /// Height the block would occupy
    pub height: u32,
    /// Bits required at this height
    pub expected_bits: u32,
    /// Fees of the non-coinbase transactions
    pub fees: u64,
    /// Proof of work was already checked by the submitter
    pub pow_checked: bool,
    pub pow: &'a dyn ProofOfWork,
    pub evaluator: &'a dyn ScriptEvaluator,
}

/// Validate proof of work for the block at `height`
pub fn validate_pow(
    block: &Block,
    height: u32,
    params: &ConsensusParams,
    pow: &dyn ProofOfWork,
) -> Result<(), ValidationError> {
    if !pow.check(&block.header, height, params, PowPurpose::Verification).valid {
        return Err(ValidationError::InvalidPoW);
    }
    Ok(())
}

/// Validate merkle root matches transactions
pub fn validate_merkle_root(block: &Block) -> Result<(), ValidationError> {
    if block.compute_merkle_root() != block.header.merkle_root {
        return Err(ValidationError::InvalidMerkleRoot);
    }
    Ok(())
}

/// Exactly one coinbase, in first position, committing to the height once
/// BIP34 is active
pub fn validate_coinbase(block: &Block, height: u32, params: &ConsensusParams) -> Result<(), ValidationError> {
    let coinbase = block.coinbase().ok_or(ValidationError::MissingCoinbase)?;
    if block.transactions.iter().skip(1).any(|tx| tx.is_coinbase()) {
        return Err(ValidationError::MultipleCoinbase);
    }

    if height >= params.bip34_height {
        let expected = Script::builder().push_int(height as i64).into_script();
        if !coinbase.inputs[0].script_sig.as_bytes().starts_with(expected.as_bytes()) {
            return Err(ValidationError::InvalidCoinbaseHeight);
        }
    }
    Ok(())
}

/// Validate the coinbase does not claim more than subsidy plus fees (or
/// anything at all once fees are burned)
pub fn validate_block_reward(
    block: &Block,
    height: u32,
    fees: u64,
    params: &ConsensusParams,
) -> Result<(), ValidationError> {
    let coinbase = block.coinbase().ok_or(ValidationError::MissingCoinbase)?;
    let claimed = coinbase.total_output_value();
    let allowed = max_coinbase_value(height, fees, params);
    if claimed > allowed {
        return Err(ValidationError::InvalidBlockReward { claimed, allowed });
    }
    Ok(())
}

/// Validate a block against its position in the chain
pub fn validate_block(block: &Block, ctx: &BlockContext<'_>) -> Result<(), ValidationError> {
    if block.header.prev_hash != ctx.prev_hash {
        return Err(ValidationError::InvalidPrevHash);
    }

    if block.header.bits != ctx.expected_bits {
        return Err(ValidationError::InvalidDifficulty {
            expected: ctx.expected_bits,
            actual: block.header.bits,
        });
    }

    if !ctx.pow_checked {
        validate_pow(block, ctx.height, ctx.params, ctx.pow)?;
    }

    validate_merkle_root(block)?;
    validate_coinbase(block, ctx.height, ctx.params)?;
    validate_block_reward(block, ctx.height, ctx.fees, ctx.params)?;

    if !check_block_authorization(block, ctx.params, ctx.height, ctx.evaluator) {
        return Err(ValidationError::InvalidSignetSolution);
    }

    Ok(())
}
