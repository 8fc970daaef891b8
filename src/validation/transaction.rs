//! Transaction structure
//!
//! Script-based inputs and outputs with segregated witness data. The
//! transaction id commits to everything except the witness.

use serde::{Deserialize, Serialize};

use crate::consensus::encode::{write_compact_size, write_var_bytes};
use crate::crypto::{hash_bytes, Hash};
use crate::script::opcodes::OP_RETURN;
use crate::script::Script;

/// Signature hash type committing to all inputs and outputs
pub const SIGHASH_ALL: u32 = 1;

/// Prefix of the witness commitment output script: `OP_RETURN`, a 36 byte
/// push, then the commitment tag
pub const WITNESS_COMMITMENT_HEADER: [u8; 6] = [OP_RETURN, 0x24, 0xaa, 0x21, 0xa9, 0xed];

/// Minimum length of a witness commitment output script
pub const MINIMUM_WITNESS_COMMITMENT: usize = 38;

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// The outpoint spent by coinbase inputs
    pub fn null() -> Self {
        Self {
            txid: Hash::zero(),
            vout: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == u32::MAX
    }
}

/// A transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// Output being spent
    pub previous_output: OutPoint,
    /// Unlocking script
    pub script_sig: Script,
    pub sequence: u32,
    /// Witness stack
    #[serde(default)]
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    pub fn new(previous_output: OutPoint, script_sig: Script, sequence: u32) -> Self {
        Self {
            previous_output,
            script_sig,
            sequence,
            witness: Vec::new(),
        }
    }
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Amount in base units
    pub value: u64,
    /// Locking script
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: u64, script_pubkey: Script) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    pub fn is_witness_commitment(&self) -> bool {
        let script = self.script_pubkey.as_bytes();
        script.len() >= MINIMUM_WITNESS_COMMITMENT && script.starts_with(&WITNESS_COMMITMENT_HEADER)
    }
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Create a new version 2 transaction
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: 2,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Create a coinbase transaction paying `value` to `script_pubkey`.
    /// The block height is pushed first in the input script.
    pub fn coinbase(height: u32, value: u64, script_pubkey: Script) -> Self {
        let script_sig = Script::builder()
            .push_int(height as i64)
            .push_int(0)
            .into_script();
        Self {
            version: 2,
            inputs: vec![TxIn::new(OutPoint::null(), script_sig, u32::MAX)],
            outputs: vec![TxOut::new(value, script_pubkey)],
            lock_time: 0,
        }
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Index of the last witness commitment output, if any
    pub fn witness_commitment_index(&self) -> Option<usize> {
        self.outputs.iter().rposition(TxOut::is_witness_commitment)
    }

    /// Transaction id: double SHA-256 of the serialization without witness
    pub fn txid(&self) -> Hash {
        hash_bytes(&self.to_bytes())
    }

    /// Witness transaction id. Equal to the txid when no input carries a
    /// witness.
    pub fn wtxid(&self) -> Hash {
        if self.has_witness() {
            hash_bytes(&self.to_witness_bytes())
        } else {
            self.txid()
        }
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Serialize with the segwit marker, flag and per-input witness stacks
    pub fn to_witness_bytes(&self) -> Vec<u8> {
        let base = self.to_bytes();
        let lock_time_at = base.len() - 4;

        let mut bytes = Vec::with_capacity(base.len() + 2);
        bytes.extend_from_slice(&base[..4]);
        bytes.extend_from_slice(&[0x00, 0x01]);
        bytes.extend_from_slice(&base[4..lock_time_at]);
        for input in &self.inputs {
            write_compact_size(&mut bytes, input.witness.len() as u64);
            for item in &input.witness {
                write_var_bytes(&mut bytes, item);
            }
        }
        bytes.extend_from_slice(&base[lock_time_at..]);
        bytes
    }

    /// Serialize without witness data
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        bytes.extend_from_slice(&self.version.to_le_bytes());

        write_compact_size(&mut bytes, self.inputs.len() as u64);
        for input in &self.inputs {
            bytes.extend_from_slice(&input.previous_output.txid.0);
            bytes.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            write_var_bytes(&mut bytes, input.script_sig.as_bytes());
            bytes.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut bytes, self.outputs.len() as u64);
        for output in &self.outputs {
            bytes.extend_from_slice(&output.value.to_le_bytes());
            write_var_bytes(&mut bytes, output.script_pubkey.as_bytes());
        }

        bytes.extend_from_slice(&self.lock_time.to_le_bytes());

        bytes
    }

    /// Legacy signature hash for input `input_index`: every input script is
    /// cleared except the signed one, which is replaced with `script_code`.
    pub fn signature_hash(&self, input_index: usize, script_code: &Script, hash_type: u32) -> Hash {
        let mut copy = self.clone();
        for (i, input) in copy.inputs.iter_mut().enumerate() {
            input.script_sig = if i == input_index {
                script_code.clone()
            } else {
                Script::new()
            };
            input.witness.clear();
        }
        let mut bytes = copy.to_bytes();
        bytes.extend_from_slice(&hash_type.to_le_bytes());
        hash_bytes(&bytes)
    }

    /// Calculate total output value
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}
