//! Script evaluation seam
//!
//! Full script execution lives outside this crate. [`ScriptEvaluator`] is the
//! boundary the signet checks call through; [`MultisigEvaluator`] is a
//! reference implementation for the challenge shapes signets use in practice.

use super::opcodes::*;
use super::{Instruction, Script};
use crate::crypto::CompressedPubKey;
use crate::validation::{Transaction, SIGHASH_ALL};

/// The input being verified
#[derive(Debug, Clone, Copy)]
pub struct SpendContext<'a> {
    /// Spending transaction
    pub tx: &'a Transaction,
    /// Index of the input under evaluation
    pub input_index: usize,
    /// Value of the output being spent
    pub amount: u64,
}

/// Decides whether a spending input satisfies a challenge script
pub trait ScriptEvaluator: Send + Sync {
    fn verify(
        &self,
        script_sig: &Script,
        witness: &[Vec<u8>],
        script_pubkey: &Script,
        ctx: &SpendContext<'_>,
    ) -> bool;
}

/// Challenge shapes understood by [`MultisigEvaluator`] and the block signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeKind {
    /// `OP_TRUE`
    AnyoneCanSpend,
    /// `<key> OP_CHECKSIG`
    PubKey(CompressedPubKey),
    /// `m <key>... n OP_CHECKMULTISIG`
    Multisig {
        required: usize,
        keys: Vec<CompressedPubKey>,
    },
}

impl ChallengeKind {
    pub fn classify(script: &Script) -> Option<Self> {
        let ops: Vec<Instruction<'_>> = script.instructions().collect::<Result<_, _>>().ok()?;

        match ops.as_slice() {
            [Instruction::Op(OP_TRUE)] => Some(ChallengeKind::AnyoneCanSpend),
            [Instruction::PushBytes(key), Instruction::Op(OP_CHECKSIG)] => {
                CompressedPubKey::from_slice(key).ok().map(ChallengeKind::PubKey)
            }
            [first, middle @ .., count, Instruction::Op(OP_CHECKMULTISIG)] => {
                let required = first.small_int()? as usize;
                let total = count.small_int()? as usize;
                let keys = middle
                    .iter()
                    .map(|ins| match ins {
                        Instruction::PushBytes(data) => CompressedPubKey::from_slice(data).ok(),
                        Instruction::Op(_) => None,
                    })
                    .collect::<Option<Vec<_>>>()?;
                if required == 0 || required > total || keys.len() != total {
                    return None;
                }
                Some(ChallengeKind::Multisig { required, keys })
            }
            _ => None,
        }
    }
}

/// Reference evaluator for bare single-key and multisig challenges
#[derive(Debug, Clone, Copy, Default)]
pub struct MultisigEvaluator;

impl MultisigEvaluator {
    fn check_sig(
        key: &CompressedPubKey,
        sig_with_type: &[u8],
        script_pubkey: &Script,
        ctx: &SpendContext<'_>,
    ) -> bool {
        let Some((&hash_type, der)) = sig_with_type.split_last() else {
            return false;
        };
        if hash_type as u32 != SIGHASH_ALL {
            return false;
        }
        let sighash = ctx.tx.signature_hash(ctx.input_index, script_pubkey, SIGHASH_ALL);
        key.verify(&sighash, der)
    }
}

impl ScriptEvaluator for MultisigEvaluator {
    fn verify(
        &self,
        script_sig: &Script,
        witness: &[Vec<u8>],
        script_pubkey: &Script,
        ctx: &SpendContext<'_>,
    ) -> bool {
        // bare scripts never carry witness data
        if !witness.is_empty() || !script_sig.is_push_only() {
            return false;
        }
        let Some(kind) = ChallengeKind::classify(script_pubkey) else {
            return false;
        };
        let pushes: Vec<&[u8]> = script_sig
            .instructions()
            .filter_map(|ins| match ins {
                Ok(Instruction::PushBytes(data)) => Some(data),
                _ => None,
            })
            .collect();

        match kind {
            ChallengeKind::AnyoneCanSpend => true,
            ChallengeKind::PubKey(key) => match pushes.as_slice() {
                [sig] => Self::check_sig(&key, sig, script_pubkey, ctx),
                _ => false,
            },
            ChallengeKind::Multisig { required, keys } => {
                // leading dummy element must be empty
                let Some((dummy, sigs)) = pushes.split_first() else {
                    return false;
                };
                if !dummy.is_empty() || sigs.len() != required {
                    return false;
                }
                // signatures must appear in the same order as their keys
                let mut key_iter = keys.iter();
                sigs.iter().all(|sig| {
                    key_iter
                        .by_ref()
                        .any(|key| Self::check_sig(key, sig, script_pubkey, ctx))
                })
            }
        }
    }
}
