//! In-memory best chain
//!
//! A single linear chain rooted at the network's genesis block. Blocks are
//! only ever connected on top of the current tip; anything else is rejected.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::TxPool;
use crate::chainparams::ChainParams;
use crate::consensus::{
    next_work_required, validate_block, Block, BlockContext, ProofOfWork, StandardPow,
    ValidationError,
};
use crate::crypto::Hash;
use crate::mining::{ChainBackend, ProcessOutcome, TipSnapshot};
use crate::script::{MultisigEvaluator, ScriptEvaluator};

/// Blocks by height plus a hash index
struct ChainIndex {
    blocks: Vec<Arc<Block>>,
    heights: HashMap<Hash, u32>,
}

impl ChainIndex {
    fn new(genesis: Block) -> Self {
        let hash = genesis.hash();
        Self {
            blocks: vec![Arc::new(genesis)],
            heights: HashMap::from([(hash, 0)]),
        }
    }

    fn tip(&self) -> &Arc<Block> {
        // the genesis block is never removed
        &self.blocks[self.blocks.len() - 1]
    }

    fn height(&self) -> u32 {
        (self.blocks.len() - 1) as u32
    }

    fn next_bits(&self, new_block_time: u32, params: &ChainParams) -> u32 {
        let tip = &self.tip().header;
        next_work_required(
            tip.bits,
            tip.time,
            self.height() + 1,
            new_block_time,
            &params.consensus,
            |height| self.blocks.get(height as usize).map(|block| block.header.time),
        )
    }
}

/// Reference chain backend
pub struct MemoryChain {
    params: Arc<ChainParams>,
    index: RwLock<ChainIndex>,
    pool: Arc<TxPool>,
    pow: Arc<dyn ProofOfWork>,
    evaluator: Arc<dyn ScriptEvaluator>,
}

impl MemoryChain {
    /// Start a chain at the network's genesis block. Fees of connected
    /// blocks are looked up in `pool`.
    pub fn new(params: Arc<ChainParams>, pool: Arc<TxPool>) -> Self {
        let index = ChainIndex::new(params.genesis.clone());
        Self {
            params,
            index: RwLock::new(index),
            pool,
            pow: Arc::new(StandardPow),
            evaluator: Arc::new(MultisigEvaluator),
        }
    }

    pub fn with_pow(mut self, pow: Arc<dyn ProofOfWork>) -> Self {
        self.pow = pow;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn height(&self) -> u32 {
        self.index.read().height()
    }

    pub fn block_at(&self, height: u32) -> Option<Arc<Block>> {
        self.index.read().blocks.get(height as usize).cloned()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.index.read().heights.contains_key(hash)
    }

    /// Bits required for a block on the current tip with timestamp
    /// `new_block_time`
    pub fn next_bits(&self, new_block_time: u32) -> u32 {
        self.index.read().next_bits(new_block_time, &self.params)
    }

    /// Validate `block` and connect it on top of the tip. Returns false for a
    /// block that is already connected.
    pub fn accept_block(&self, block: Arc<Block>, min_pow_checked: bool) -> Result<bool, ValidationError> {
        let hash = block.hash();
        let mut index = self.index.write();
        if index.heights.contains_key(&hash) {
            return Ok(false);
        }

        let tip = index.tip().header.clone();
        let height = index.height() + 1;
        let ctx = BlockContext {
            params: &self.params.consensus,
            prev_hash: tip.hash(),
            height,
            expected_bits: index.next_bits(block.header.time, &self.params),
            fees: self.pool.fees_for_block(&block),
            pow_checked: min_pow_checked,
            pow: self.pow.as_ref(),
            evaluator: self.evaluator.as_ref(),
        };
        validate_block(&block, &ctx)?;

        index.heights.insert(hash, height);
        index.blocks.push(Arc::clone(&block));
        drop(index);

        self.pool.remove_for_block(&block);
        info!(height, %hash, txs = block.transactions.len(), "Connected block");
        Ok(true)
    }
}

impl ChainBackend for MemoryChain {
    fn tip(&self) -> TipSnapshot {
        let index = self.index.read();
        let tip = index.tip();
        TipSnapshot {
            hash: tip.hash(),
            height: index.height(),
            time: tip.header.time,
            bits: tip.header.bits,
        }
    }

    fn params(&self) -> &ChainParams {
        &self.params
    }

    fn process_new_block(
        &self,
        block: Arc<Block>,
        _force_processing: bool,
        min_pow_checked: bool,
    ) -> ProcessOutcome {
        match self.accept_block(block, min_pow_checked) {
            Ok(new_block) => {
                if !new_block {
                    debug!("Block already known");
                }
                ProcessOutcome { accepted: true, new_block }
            }
            Err(e) => {
                warn!("Block rejected: {}", e);
                ProcessOutcome { accepted: false, new_block: false }
            }
        }
    }
}
