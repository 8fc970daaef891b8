//! Block reward calculation
//!
//! Bitcoin-style halving schedule. On chains with a signet fork the subsidy
//! drops to zero at the activation height and fees are burned, so the
//! coinbase of every post-fork block carries no value.

use crate::chainparams::ConsensusParams;

/// Number of halvings after which the subsidy is zero
const MAX_HALVINGS: u32 = 64;

/// Calculate the block subsidy for a given height
///
/// This is a pure, deterministic function.
pub fn block_subsidy(height: u32, params: &ConsensusParams) -> u64 {
    if is_post_fork(height, params) {
        return 0;
    }

    if params.subsidy_halving_interval == 0 {
        return params.initial_subsidy;
    }

    let halvings = height / params.subsidy_halving_interval;
    if halvings >= MAX_HALVINGS {
        return 0;
    }

    params.initial_subsidy >> halvings
}

/// Maximum value the coinbase at `height` may claim given the block's fees
pub fn max_coinbase_value(height: u32, fees: u64, params: &ConsensusParams) -> u64 {
    // post-fork fees are burned rather than collected
    if is_post_fork(height, params) {
        return 0;
    }
    block_subsidy(height, params).saturating_add(fees)
}

fn is_post_fork(height: u32, params: &ConsensusParams) -> bool {
    params.signet_activation_height > 0 && height >= params.signet_activation_height
}

/// Calculate total issued supply after a given number of blocks
///
/// Used for testing and verification only.
pub fn calculate_total_issued(num_blocks: u32, params: &ConsensusParams) -> u64 {
    (0..num_blocks).fold(0u64, |total, height| total.saturating_add(block_subsidy(height, params)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chainparams::{ChainOptions, ChainParams, ChainType};
    use crate::COIN;

    fn alpha_regtest_with_fork(fork_height: u32) -> ConsensusParams {
        let mut consensus =
            ChainParams::create(ChainType::AlphaRegtest, &ChainOptions::default()).consensus;
        consensus.signet_activation_height = fork_height;
        consensus
    }

    #[test]
    fn test_alpha_subsidy_boundary() {
        let params = alpha_regtest_with_fork(5);
        assert_eq!(block_subsidy(0, &params), 10 * COIN);
        assert_eq!(block_subsidy(4, &params), 10 * COIN);
        assert_eq!(block_subsidy(5, &params), 0);
        assert_eq!(block_subsidy(6, &params), 0);
        assert_eq!(block_subsidy(1005, &params), 0);
    }

    #[test]
    fn test_subsidy_unchanged_when_fork_disabled() {
        let params = alpha_regtest_with_fork(0);
        assert_eq!(block_subsidy(0, &params), 10 * COIN);
        assert_eq!(block_subsidy(5, &params), 10 * COIN);
        assert_eq!(block_subsidy(1005, &params), 10 * COIN);
    }

    #[test]
    fn test_halving_schedule() {
        let params = ChainParams::create(ChainType::Main, &ChainOptions::default()).consensus;
        let interval = params.subsidy_halving_interval;
        assert_eq!(block_subsidy(0, &params), 50 * COIN);
        assert_eq!(block_subsidy(interval - 1, &params), 50 * COIN);
        assert_eq!(block_subsidy(interval, &params), 25 * COIN);
        assert_eq!(block_subsidy(interval * 2, &params), 25 * COIN / 2);
        assert_eq!(block_subsidy(interval * 64, &params), 0);
    }

    #[test]
    fn test_fees_burned_post_fork() {
        let params = alpha_regtest_with_fork(5);
        assert_eq!(max_coinbase_value(4, 1_000, &params), 10 * COIN + 1_000);
        assert_eq!(max_coinbase_value(5, 1_000, &params), 0);
    }

    #[test]
    fn test_total_issued_stops_at_fork() {
        let params = alpha_regtest_with_fork(5);
        assert_eq!(calculate_total_issued(100, &params), 50 * COIN);
    }
}
