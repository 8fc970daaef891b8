//! Proof-of-work predicates
//!
//! Below `randomx_height` a header is valid when its double SHA-256 hash
//! meets the compact target. From that height on the alternate algorithm
//! applies: a BLAKE3 hash of the header, stored in the header as the
//! auxiliary hash, must meet the target scaled by `randomx_diff_mult`.

use serde::{Deserialize, Serialize};

use super::{decode_compact, hash_meets_target, multiply_target, BlockHeader, Target};
use crate::chainparams::ConsensusParams;
use crate::crypto::{blake3_hash, Hash};

/// Why the predicate is being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowPurpose {
    /// Nonce search on a candidate; the auxiliary hash is produced
    Mining,
    /// Checking a received header; the stored auxiliary hash must match
    Verification,
}

/// Outcome of a proof-of-work evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowResult {
    pub valid: bool,
    /// Auxiliary hash to store in the header, when the alternate algorithm
    /// produced one
    pub aux_hash: Option<Hash>,
}

impl PowResult {
    fn invalid() -> Self {
        Self { valid: false, aux_hash: None }
    }
}

/// A proof-of-work predicate, selectable per height
pub trait ProofOfWork: Send + Sync {
    fn check(
        &self,
        header: &BlockHeader,
        height: u32,
        params: &ConsensusParams,
        purpose: PowPurpose,
    ) -> PowResult;
}

/// Double SHA-256 below the alternate activation height, BLAKE3 from it on
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPow;

impl StandardPow {
    fn alternate_active(height: u32, params: &ConsensusParams) -> bool {
        params.randomx_height > 0 && height >= params.randomx_height
    }
}

impl ProofOfWork for StandardPow {
    fn check(
        &self,
        header: &BlockHeader,
        height: u32,
        params: &ConsensusParams,
        purpose: PowPurpose,
    ) -> PowResult {
        let Some(target) = checked_target(header.bits, params) else {
            return PowResult::invalid();
        };

        let legacy_valid = || hash_meets_target(&header.hash(), &target);

        if !Self::alternate_active(height, params) {
            return PowResult { valid: legacy_valid(), aux_hash: None };
        }

        // headers from before enforcement may still carry legacy work
        if purpose == PowPurpose::Verification
            && height < params.randomx_enforcement_height
            && legacy_valid()
        {
            return PowResult { valid: true, aux_hash: None };
        }

        let aux_hash = blake3_hash(&header.to_bytes());
        if purpose == PowPurpose::Verification && header.aux_pow_hash != aux_hash {
            return PowResult::invalid();
        }

        let alt_target = multiply_target(&target, params.randomx_diff_mult.max(1) as u64, 1);
        PowResult {
            valid: hash_meets_target(&aux_hash, &alt_target),
            aux_hash: Some(aux_hash),
        }
    }
}

/// Decode `bits` and reject targets easier than the chain's limit
fn checked_target(bits: u32, params: &ConsensusParams) -> Option<Target> {
    let target = decode_compact(bits)?;
    if target > params.pow_limit() {
        return None;
    }
    Some(target)
}

/// Legacy check of a block hash against compact bits
pub fn check_proof_of_work(hash: &Hash, bits: u32, params: &ConsensusParams) -> bool {
    match checked_target(bits, params) {
        Some(target) => hash_meets_target(hash, &target),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chainparams::{ChainOptions, ChainParams, ChainType};

    fn regtest_header() -> BlockHeader {
        BlockHeader::new(1, Hash::zero(), Hash::zero(), 1_700_000_000, 0x207fffff, 0)
    }

    fn solve(header: &mut BlockHeader, height: u32, params: &ConsensusParams) -> PowResult {
        loop {
            let result = StandardPow.check(header, height, params, PowPurpose::Mining);
            if result.valid {
                return result;
            }
            header.nonce += 1;
        }
    }

    #[test]
    fn test_legacy_below_activation() {
        let params = ChainParams::create(ChainType::Regtest, &ChainOptions::default()).consensus;
        let mut header = regtest_header();
        let result = solve(&mut header, 1, &params);
        assert_eq!(result.aux_hash, None);
        assert!(check_proof_of_work(&header.hash(), header.bits, &params));
    }

    #[test]
    fn test_alternate_produces_aux_hash() {
        let params = ChainParams::create(ChainType::AlphaRegtest, &ChainOptions::default()).consensus;
        let mut header = regtest_header();
        let result = solve(&mut header, params.randomx_height, &params);
        let aux = result.aux_hash.expect("alternate pow yields aux hash");

        header.aux_pow_hash = aux;
        let verified = StandardPow.check(&header, params.randomx_height, &params, PowPurpose::Verification);
        assert!(verified.valid);
    }

    #[test]
    fn test_verification_rejects_wrong_aux_hash() {
        let mut params = ChainParams::create(ChainType::AlphaRegtest, &ChainOptions::default()).consensus;
        params.randomx_enforcement_height = 0;
        let mut header = regtest_header();
        solve(&mut header, params.randomx_height, &params);
        header.aux_pow_hash = Hash::zero();
        let verified = StandardPow.check(&header, params.randomx_height, &params, PowPurpose::Verification);
        assert!(!verified.valid);
    }

    #[test]
    fn test_bits_easier_than_limit_rejected() {
        let params = ChainParams::create(ChainType::Main, &ChainOptions::default()).consensus;
        let header = regtest_header();
        assert!(!StandardPow.check(&header, 1, &params, PowPurpose::Verification).valid);
    }
}
