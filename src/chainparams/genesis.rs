//! Genesis block generation
//!
//! Every chain starts from the same coinbase layout; only the timestamp,
//! nonce, bits, version and reward differ.

use crate::consensus::{Block, BlockHeader};
use crate::crypto::Hash;
use crate::script::opcodes::OP_CHECKSIG;
use crate::script::Script;
use crate::validation::{OutPoint, Transaction, TxIn, TxOut};

/// Message embedded in the genesis coinbase
pub const GENESIS_MESSAGE: &str =
    "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// Key paid by the genesis output
pub const GENESIS_OUTPUT_KEY: &str = "04678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5f";

/// Create a genesis block
///
/// Produces a reproducible, byte-for-byte identical block for the same
/// arguments. The coinbase is not spendable.
pub fn create_genesis_block(time: u32, nonce: u32, bits: u32, version: i32, reward: u64) -> Block {
    let script_sig = Script::builder()
        .push_int(486_604_799)
        .push_slice(&[4])
        .push_slice(GENESIS_MESSAGE.as_bytes())
        .into_script();

    // constant hex, always decodes
    let output_key = hex::decode(GENESIS_OUTPUT_KEY).unwrap_or_default();
    let script_pubkey = Script::builder()
        .push_slice(&output_key)
        .push_opcode(OP_CHECKSIG)
        .into_script();

    let coinbase = Transaction {
        version: 1,
        inputs: vec![TxIn::new(OutPoint::null(), script_sig, u32::MAX)],
        outputs: vec![TxOut::new(reward, script_pubkey)],
        lock_time: 0,
    };

    let header = BlockHeader::new(version, Hash::zero(), Hash::zero(), time, bits, nonce);
    let mut genesis = Block::new(header, vec![coinbase]);
    genesis.header.merkle_root = genesis.compute_merkle_root();
    genesis
}
