//! Block template construction
//!
//! Builds candidates on the in-memory chain's tip from pooled transactions.
//! Blocks that must carry a signet solution are signed here with the
//! configured keys.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::{MemoryChain, TxPool};
use crate::chainparams::ConsensusParams;
use crate::consensus::{
    extract_pubkeys_from_challenge, max_coinbase_value, sign_block, signet_phase, Block,
    BlockHeader, SignetPhase,
};
use crate::crypto::{Hash, PrivateKey};
use crate::mining::{AssembleError, BlockAssembler, BlockTemplate, ChainBackend};
use crate::script::Script;
use crate::validation::Transaction;

/// Version of assembled blocks, top bits set for version bits signalling
pub const BLOCK_VERSION: i32 = 0x2000_0000;

/// Reference block assembler
pub struct MemoryAssembler {
    chain: Arc<MemoryChain>,
    pool: Arc<TxPool>,
    signing_keys: Vec<PrivateKey>,
    max_block_txs: usize,
}

impl MemoryAssembler {
    pub fn new(chain: Arc<MemoryChain>, pool: Arc<TxPool>) -> Self {
        Self {
            chain,
            pool,
            signing_keys: Vec::new(),
            max_block_txs: 1_000,
        }
    }

    /// Keys used to satisfy signet challenges
    pub fn with_signing_keys(mut self, keys: Vec<PrivateKey>) -> Self {
        self.signing_keys = keys;
        self
    }

    pub fn with_max_block_txs(mut self, max: usize) -> Self {
        self.max_block_txs = max;
        self
    }
}

/// Challenge a block at `height` has to satisfy, if any
fn required_challenge(params: &ConsensusParams, height: u32) -> Option<&Script> {
    let challenge = if params.signet_blocks {
        &params.signet_challenge
    } else if params.signet_activation_height > 0 {
        match signet_phase(height, params.signet_activation_height) {
            SignetPhase::Legacy => &params.signet_challenge,
            SignetPhase::Forked => &params.signet_challenge_alpha,
        }
    } else {
        return None;
    };
    (!challenge.is_empty()).then_some(challenge)
}

fn current_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

impl BlockAssembler for MemoryAssembler {
    fn create_new_block(&self, coinbase_script: &Script) -> Result<Option<BlockTemplate>, AssembleError> {
        let tip = self.chain.tip();
        let params = &self.chain.params().consensus;
        let height = tip.height + 1;

        let challenge = required_challenge(params, height);
        if let Some(challenge) = challenge {
            if self.signing_keys.is_empty() && !extract_pubkeys_from_challenge(challenge).is_empty() {
                debug!(height, "No signing keys for signet challenge");
                return Ok(None);
            }
        }

        let entries = self.pool.select(self.max_block_txs);
        let fees = entries
            .iter()
            .try_fold(0u64, |total, entry| total.checked_add(entry.fee))
            .ok_or(AssembleError::ValueOverflow)?;

        let value = max_coinbase_value(height, fees, params);
        let mut transactions = vec![Transaction::coinbase(height, value, coinbase_script.clone())];
        transactions.extend(entries.into_iter().map(|entry| entry.tx));

        let time = current_time().max(tip.time + 1);
        let bits = self.chain.next_bits(time);
        let header = BlockHeader::new(BLOCK_VERSION, tip.hash, Hash::zero(), time, bits, 0);

        let mut block = Block::new(header, transactions);
        block.add_witness_commitment();
        block.header.merkle_root = block.compute_merkle_root();

        if let Some(challenge) = challenge {
            sign_block(&mut block, challenge, &self.signing_keys)?;
        }

        debug!(height, txs = block.transactions.len(), value, "Assembled block template");
        Ok(Some(BlockTemplate { block, height }))
    }
}
