//! Pending transaction pool
//!
//! Holds transactions waiting for a block together with the fee each one
//! pays. Admission does no script or UTXO validation; callers supply the fee.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

use crate::consensus::Block;
use crate::crypto::Hash;
use crate::validation::Transaction;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("transaction already in pool")]
    Duplicate,
    #[error("coinbase transactions cannot be pooled")]
    Coinbase,
    #[error("pool is full (capacity: {0})")]
    Full(usize),
}

/// A pooled transaction and its fee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub tx: Transaction,
    pub fee: u64,
}

#[derive(Default)]
struct PoolInner {
    entries: HashMap<Hash, PoolEntry>,
    /// Arrival order, used for selection
    order: VecDeque<Hash>,
}

pub struct TxPool {
    capacity: usize,
    inner: RwLock<PoolInner>,
}

impl TxPool {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(PoolInner::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn contains(&self, txid: &Hash) -> bool {
        self.inner.read().entries.contains_key(txid)
    }

    /// Fee of a pooled transaction
    pub fn fee(&self, txid: &Hash) -> Option<u64> {
        self.inner.read().entries.get(txid).map(|entry| entry.fee)
    }

    pub fn add(&self, tx: Transaction, fee: u64) -> Result<Hash, PoolError> {
        if tx.is_coinbase() {
            return Err(PoolError::Coinbase);
        }

        let txid = tx.txid();
        let mut inner = self.inner.write();
        if inner.entries.contains_key(&txid) {
            return Err(PoolError::Duplicate);
        }
        if inner.entries.len() >= self.capacity {
            return Err(PoolError::Full(self.capacity));
        }

        inner.order.push_back(txid);
        inner.entries.insert(txid, PoolEntry { tx, fee });
        Ok(txid)
    }

    /// Up to `max` entries in arrival order
    pub fn select(&self, max: usize) -> Vec<PoolEntry> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|txid| inner.entries.get(txid))
            .take(max)
            .cloned()
            .collect()
    }

    /// Total fees of the non-coinbase transactions of `block`. Transactions
    /// the pool does not know pay nothing.
    pub fn fees_for_block(&self, block: &Block) -> u64 {
        let inner = self.inner.read();
        block
            .transactions
            .iter()
            .skip(1)
            .filter_map(|tx| inner.entries.get(&tx.txid()))
            .fold(0u64, |total, entry| total.saturating_add(entry.fee))
    }

    /// Drop every transaction confirmed by `block`
    pub fn remove_for_block(&self, block: &Block) {
        let mut inner = self.inner.write();
        for tx in block.transactions.iter().skip(1) {
            inner.entries.remove(&tx.txid());
        }
        let PoolInner { entries, order } = &mut *inner;
        order.retain(|txid| entries.contains_key(txid));
    }
}

impl Default for TxPool {
    fn default() -> Self {
        Self::new()
    }
}
