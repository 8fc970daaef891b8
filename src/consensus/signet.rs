//! Signet block authorization
//!
//! A signet block carries a solution to the chain's challenge script inside
//! its coinbase witness commitment. The solution is checked by spending a
//! virtual `to_spend` transaction (which pays the challenge and commits to
//! the block) with a virtual `to_sign` transaction.
//!
//! Chains with a signet fork switch from the primary challenge to the
//! alternate challenge at the activation height.

use thiserror::Error;
use tracing::debug;

use super::encode::{write_compact_size, write_var_bytes, Reader};
use super::Block;
use crate::chainparams::ConsensusParams;
use crate::crypto::{compute_merkle_root, CompressedPubKey, Hash, KeyError, PrivateKey};
use crate::script::opcodes::OP_RETURN;
use crate::script::{ChallengeKind, Instruction, Script, ScriptEvaluator, SpendContext};
use crate::validation::{OutPoint, Transaction, TxIn, TxOut, SIGHASH_ALL};

/// Marker prefixing the solution push inside the witness commitment
pub const SIGNET_HEADER: [u8; 4] = [0xec, 0xc7, 0xda, 0xa2];

/// Errors from producing a block solution
#[derive(Debug, Error)]
pub enum SignetError {
    #[error("block has no coinbase")]
    NoCoinbase,
    #[error("could not build signet transactions for block")]
    MalformedBlock,
    #[error("challenge script is not a supported single-key or multisig form")]
    UnsupportedChallenge,
    #[error("challenge needs {required} signatures, only {available} matching keys given")]
    MissingKeys { required: usize, available: usize },
    #[error("signing failed: {0}")]
    Key(#[from] KeyError),
}

/// Which challenge governs a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignetPhase {
    /// Primary challenge, or no fork configured
    Legacy,
    /// Alternate challenge, at or above the activation height
    Forked,
}

/// Phase for a block at `height` given the activation height (0 disables
/// the fork)
pub fn signet_phase(height: u32, activation_height: u32) -> SignetPhase {
    match (height, activation_height) {
        (_, 0) => SignetPhase::Legacy,
        (h, a) if h < a => SignetPhase::Legacy,
        _ => SignetPhase::Forked,
    }
}

/// The virtual transaction pair a signet solution is checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignetTxs {
    pub to_spend: Transaction,
    pub to_sign: Transaction,
}

impl SignetTxs {
    /// Derive the pair for `block` under `challenge`.
    ///
    /// Returns `None` when the block has no coinbase, the coinbase has no
    /// witness commitment, or the embedded solution does not parse. A
    /// commitment without a solution yields an empty one, which trivial
    /// challenges such as `OP_TRUE` accept.
    pub fn create(block: &Block, challenge: &Script) -> Option<SignetTxs> {
        let coinbase = block.transactions.first()?;
        let commitment_index = coinbase.witness_commitment_index()?;

        let mut modified_coinbase = coinbase.clone();
        let mut to_sign = Transaction {
            version: 0,
            inputs: vec![TxIn::new(OutPoint::null(), Script::new(), 0)],
            outputs: vec![TxOut::new(0, Script::builder().push_opcode(OP_RETURN).into_script())],
            lock_time: 0,
        };

        let commitment = &mut modified_coinbase.outputs[commitment_index].script_pubkey;
        if let Some((cleared, solution)) = fetch_and_clear_commitment_section(&SIGNET_HEADER, commitment) {
            *commitment = cleared;
            let (script_sig, witness) = parse_solution(&solution)?;
            to_sign.inputs[0].script_sig = script_sig;
            to_sign.inputs[0].witness = witness;
        }

        let signet_merkle = modified_merkle_root(&modified_coinbase, block);

        let mut block_data = Vec::with_capacity(72);
        block_data.extend_from_slice(&block.header.version.to_le_bytes());
        block_data.extend_from_slice(&block.header.prev_hash.0);
        block_data.extend_from_slice(&signet_merkle.0);
        block_data.extend_from_slice(&block.header.time.to_le_bytes());

        let to_spend = Transaction {
            version: 0,
            inputs: vec![TxIn::new(
                OutPoint::null(),
                Script::builder().push_int(0).push_slice(&block_data).into_script(),
                0,
            )],
            outputs: vec![TxOut::new(0, challenge.clone())],
            lock_time: 0,
        };

        to_sign.inputs[0].previous_output = OutPoint::new(to_spend.txid(), 0);

        Some(SignetTxs { to_spend, to_sign })
    }

    fn verify(&self, evaluator: &dyn ScriptEvaluator) -> bool {
        let input = &self.to_sign.inputs[0];
        let spent = &self.to_spend.outputs[0];
        let ctx = SpendContext {
            tx: &self.to_sign,
            input_index: 0,
            amount: spent.value,
        };
        evaluator.verify(&input.script_sig, &input.witness, &spent.script_pubkey, &ctx)
    }
}

/// Remove the data following `header` from the first push that starts with
/// it and carries more than the header itself. Returns the rewritten script
/// and the removed bytes, or `None` when no such push exists.
fn fetch_and_clear_commitment_section(header: &[u8], script: &Script) -> Option<(Script, Vec<u8>)> {
    let mut replacement = Script::builder();
    let mut section = None;

    for instruction in script.instructions() {
        let Ok(instruction) = instruction else {
            break;
        };
        replacement = match instruction {
            Instruction::PushBytes(data)
                if section.is_none() && data.len() > header.len() && data.starts_with(header) =>
            {
                section = Some(data[header.len()..].to_vec());
                replacement.push_slice(header)
            }
            Instruction::PushBytes(data) => replacement.push_slice(data),
            Instruction::Op(op) => replacement.push_opcode(op),
        };
    }

    section.map(|data| (replacement.into_script(), data))
}

/// Merkle root with the coinbase replaced
fn modified_merkle_root(coinbase: &Transaction, block: &Block) -> Hash {
    let mut leaves = Vec::with_capacity(block.transactions.len());
    leaves.push(coinbase.txid());
    leaves.extend(block.transactions.iter().skip(1).map(Transaction::txid));
    compute_merkle_root(&leaves)
}

/// A solution is a length-prefixed scriptSig followed by the witness stack,
/// with nothing after it
fn parse_solution(solution: &[u8]) -> Option<(Script, Vec<Vec<u8>>)> {
    let mut reader = Reader::new(solution);
    let script_sig = Script::from_bytes(reader.read_var_bytes().ok()?);
    let count = reader.read_compact_size().ok()?;
    let mut witness = Vec::new();
    for _ in 0..count {
        witness.push(reader.read_var_bytes().ok()?);
    }
    reader.finish().ok()?;
    Some((script_sig, witness))
}

fn encode_solution(script_sig: &Script, witness: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    write_var_bytes(&mut out, script_sig.as_bytes());
    write_compact_size(&mut out, witness.len() as u64);
    for item in witness {
        write_var_bytes(&mut out, item);
    }
    out
}

fn check_with_challenge(block: &Block, challenge: &Script, evaluator: &dyn ScriptEvaluator) -> bool {
    let Some(txs) = SignetTxs::create(block, challenge) else {
        debug!(block = %block.hash(), "signet check: block solution parse failure");
        return false;
    };
    if !txs.verify(evaluator) {
        debug!(block = %block.hash(), "signet check: invalid block solution");
        return false;
    }
    true
}

/// Check a block against the primary signet challenge
pub fn check_signet_block_solution(
    block: &Block,
    params: &ConsensusParams,
    evaluator: &dyn ScriptEvaluator,
) -> bool {
    if params.signet_challenge.is_empty() {
        return true;
    }
    if block.hash() == params.hash_genesis_block {
        return true;
    }
    check_with_challenge(block, &params.signet_challenge, evaluator)
}

/// Check a block at `height`, switching to the alternate challenge from the
/// signet activation height on. An empty alternate challenge rejects every
/// post-fork block.
pub fn check_signet_block_solution_at_height(
    block: &Block,
    params: &ConsensusParams,
    height: u32,
    evaluator: &dyn ScriptEvaluator,
) -> bool {
    match signet_phase(height, params.signet_activation_height) {
        SignetPhase::Legacy => check_signet_block_solution(block, params, evaluator),
        SignetPhase::Forked => {
            if params.signet_challenge_alpha.is_empty() {
                debug!(height, "signet check: no alternate challenge configured");
                return false;
            }
            check_with_challenge(block, &params.signet_challenge_alpha, evaluator)
        }
    }
}

/// Authorization rule for a block at `height` on any chain: signet chains
/// always use the primary challenge, forked chains the height-gated check,
/// and everything else passes.
pub fn check_block_authorization(
    block: &Block,
    params: &ConsensusParams,
    height: u32,
    evaluator: &dyn ScriptEvaluator,
) -> bool {
    if params.signet_blocks {
        check_signet_block_solution(block, params, evaluator)
    } else if params.signet_activation_height > 0 {
        check_signet_block_solution_at_height(block, params, height, evaluator)
    } else {
        true
    }
}

/// Collect every push in `challenge` that is a valid compressed public key,
/// in script order. Scanning stops at the first malformed push.
pub fn extract_pubkeys_from_challenge(challenge: &Script) -> Vec<CompressedPubKey> {
    challenge
        .instructions()
        .map_while(Result::ok)
        .filter_map(|instruction| match instruction {
            Instruction::PushBytes(data) => CompressedPubKey::from_slice(data).ok(),
            Instruction::Op(_) => None,
        })
        .collect()
}

/// Sign `block` for `challenge` with whichever of `keys` the challenge
/// names, embedding the solution in the coinbase witness commitment (added
/// if missing) and updating the merkle root.
pub fn sign_block(block: &mut Block, challenge: &Script, keys: &[PrivateKey]) -> Result<(), SignetError> {
    if !block.add_witness_commitment() {
        return Err(SignetError::NoCoinbase);
    }
    let kind = ChallengeKind::classify(challenge).ok_or(SignetError::UnsupportedChallenge)?;

    let commitment_index = block
        .coinbase()
        .and_then(Transaction::witness_commitment_index)
        .ok_or(SignetError::NoCoinbase)?;
    let base = strip_signet_sections(&block.transactions[0].outputs[commitment_index].script_pubkey);

    // a bare header is not a solution, so the signed data is the same with
    // or without the solution attached
    set_commitment(block, commitment_index, with_signet_push(&base, &SIGNET_HEADER));
    let txs = SignetTxs::create(block, challenge).ok_or(SignetError::MalformedBlock)?;
    let sighash = txs.to_sign.signature_hash(0, challenge, SIGHASH_ALL);

    let sign = |key: &PrivateKey| -> Result<Vec<u8>, SignetError> {
        let mut sig = key.sign(&sighash)?;
        sig.push(SIGHASH_ALL as u8);
        Ok(sig)
    };

    let script_sig = match kind {
        ChallengeKind::AnyoneCanSpend => Script::new(),
        ChallengeKind::PubKey(pubkey) => {
            let key = keys
                .iter()
                .find(|k| k.public_key() == pubkey)
                .ok_or(SignetError::MissingKeys { required: 1, available: 0 })?;
            Script::builder().push_slice(&sign(key)?).into_script()
        }
        ChallengeKind::Multisig { required, keys: pubkeys } => {
            let signers: Vec<&PrivateKey> = pubkeys
                .iter()
                .filter_map(|pk| keys.iter().find(|k| k.public_key() == *pk))
                .take(required)
                .collect();
            if signers.len() < required {
                return Err(SignetError::MissingKeys { required, available: signers.len() });
            }
            let mut builder = Script::builder().push_int(0);
            for key in signers {
                builder = builder.push_slice(&sign(key)?);
            }
            builder.into_script()
        }
    };

    let mut section = SIGNET_HEADER.to_vec();
    section.extend_from_slice(&encode_solution(&script_sig, &[]));
    set_commitment(block, commitment_index, with_signet_push(&base, &section));
    block.header.merkle_root = block.compute_merkle_root();
    Ok(())
}

fn strip_signet_sections(script: &Script) -> Script {
    let mut builder = Script::builder();
    for instruction in script.instructions().map_while(Result::ok) {
        builder = match instruction {
            Instruction::PushBytes(data) if data.starts_with(&SIGNET_HEADER) => builder,
            Instruction::PushBytes(data) => builder.push_slice(data),
            Instruction::Op(op) => builder.push_opcode(op),
        };
    }
    builder.into_script()
}

fn with_signet_push(base: &Script, data: &[u8]) -> Script {
    let mut bytes = base.as_bytes().to_vec();
    bytes.extend_from_slice(Script::builder().push_slice(data).into_script().as_bytes());
    Script::from_bytes(bytes)
}

fn set_commitment(block: &mut Block, index: usize, script: Script) {
    block.transactions[0].outputs[index].script_pubkey = script;
}
