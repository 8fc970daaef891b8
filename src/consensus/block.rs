//! Block structure
//!
//! Bitcoin-layout 80 byte headers with an auxiliary proof-of-work hash
//! carried alongside.

use serde::{Deserialize, Serialize};
use crate::crypto::{compute_merkle_root, hash_bytes, Hash};
use crate::script::opcodes::OP_RETURN;
use crate::script::Script;
use crate::validation::{Transaction, TxOut, WITNESS_COMMITMENT_HEADER};

/// Size of the serialized header that the block hash commits to
pub const HEADER_SIZE: usize = 80;

/// Block header containing all metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Protocol version
    pub version: i32,
    /// Hash of the previous block
    pub prev_hash: Hash,
    /// Merkle root of all transactions
    pub merkle_root: Hash,
    /// Block timestamp (seconds since Unix epoch)
    pub time: u32,
    /// Difficulty target (compact representation)
    pub bits: u32,
    /// Nonce used for PoW
    pub nonce: u32,
    /// Alternate proof-of-work hash, zero until the alternate algorithm is
    /// active. Not part of the block identity.
    #[serde(default)]
    pub aux_pow_hash: Hash,
}

impl BlockHeader {
    /// Create a new block header
    pub fn new(
        version: i32,
        prev_hash: Hash,
        merkle_root: Hash,
        time: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        Self {
            version,
            prev_hash,
            merkle_root,
            time,
            bits,
            nonce,
            aux_pow_hash: Hash::zero(),
        }
    }

    /// Serialize the header for hashing
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.prev_hash.0);
        bytes.extend_from_slice(&self.merkle_root.0);
        bytes.extend_from_slice(&self.time.to_le_bytes());
        bytes.extend_from_slice(&self.bits.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Calculate the hash of this header
    pub fn hash(&self) -> Hash {
        crate::crypto::hash_bytes(&self.to_bytes())
    }
}

/// A complete block containing header and transactions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// List of transactions in this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// Get the block hash
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn prev_hash(&self) -> &Hash {
        &self.header.prev_hash
    }

    /// First transaction, if it is a coinbase
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Merkle root over the current transaction ids
    pub fn compute_merkle_root(&self) -> Hash {
        let txids: Vec<Hash> = self.transactions.iter().map(Transaction::txid).collect();
        compute_merkle_root(&txids)
    }

    /// Merkle root over the witness transaction ids, with a zero leaf in the
    /// coinbase position
    pub fn compute_witness_merkle_root(&self) -> Hash {
        let mut leaves = vec![Hash::zero()];
        leaves.extend(self.transactions.iter().skip(1).map(Transaction::wtxid));
        compute_merkle_root(&leaves)
    }

    /// Append a witness commitment output to the coinbase unless it already
    /// has one. Returns false when there is no coinbase.
    ///
    /// The commitment covers the witness root with a zero reserved value.
    pub fn add_witness_commitment(&mut self) -> bool {
        let witness_root = self.compute_witness_merkle_root();

        let Some(coinbase) = self.transactions.first_mut().filter(|tx| tx.is_coinbase()) else {
            return false;
        };
        if coinbase.witness_commitment_index().is_some() {
            return true;
        }

        let mut preimage = witness_root.0.to_vec();
        preimage.extend_from_slice(&[0u8; 32]);
        let mut payload = WITNESS_COMMITMENT_HEADER[2..].to_vec();
        payload.extend_from_slice(&hash_bytes(&preimage).0);

        let script = Script::builder()
            .push_opcode(OP_RETURN)
            .push_slice(&payload)
            .into_script();
        coinbase.outputs.push(TxOut::new(0, script));
        coinbase.inputs[0].witness = vec![vec![0u8; 32]];
        true
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.header.prev_hash == Hash::zero()
    }
}
