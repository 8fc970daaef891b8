//! Difficulty adjustment algorithm
//!
//! Compact target encoding, 256-bit target arithmetic, and the per-chain
//! retarget rule including the reset to the proof-of-work limit at the
//! signet fork height.

use crate::chainparams::ConsensusParams;
use crate::crypto::Hash;

/// Maximum adjustment factor (4x in either direction per period)
const MAX_ADJUSTMENT_FACTOR: i64 = 4;

/// 256-bit big-endian target
pub type Target = [u8; 32];

/// Calculate the new difficulty target at a retarget boundary
///
/// The elapsed time of the period is clamped to 4x in either direction and
/// the result never goes easier than the proof-of-work limit.
pub fn calculate_next_difficulty(
    current_bits: u32,
    first_block_time: u32,
    last_block_time: u32,
    params: &ConsensusParams,
) -> u32 {
    let expected_time = params.pow_target_timespan;

    let actual_time = last_block_time as i64 - first_block_time as i64;
    let actual_time = actual_time.max(expected_time / MAX_ADJUSTMENT_FACTOR);
    let actual_time = actual_time.min(expected_time * MAX_ADJUSTMENT_FACTOR);

    let current_target = compact_to_target(current_bits);
    let new_target = multiply_target(&current_target, actual_time as u64, expected_time as u64);

    let limit = params.pow_limit();
    if new_target > limit {
        target_to_compact(&limit)
    } else {
        target_to_compact(&new_target)
    }
}

/// Compact bits required for the block at `height` built on a tip with
/// `tip_bits` and `tip_time`.
///
/// `new_block_time` is the candidate's timestamp, used by chains that allow
/// minimum-difficulty blocks. `ancestor_time` looks up the timestamp of a
/// block by height and is only consulted at retarget boundaries.
pub fn next_work_required(
    tip_bits: u32,
    tip_time: u32,
    height: u32,
    new_block_time: u32,
    params: &ConsensusParams,
    ancestor_time: impl FnOnce(u32) -> Option<u32>,
) -> u32 {
    let pow_limit_bits = target_to_compact(&params.pow_limit());

    // difficulty resets when the signet fork activates
    if params.signet_activation_height > 0 && height == params.signet_activation_height {
        return pow_limit_bits;
    }

    let interval = params.difficulty_adjustment_interval();
    if !should_adjust_difficulty(height, interval) {
        if params.pow_allow_min_difficulty_blocks
            && new_block_time as i64 > tip_time as i64 + params.pow_target_spacing * 2
        {
            return pow_limit_bits;
        }
        return tip_bits;
    }

    if params.pow_no_retargeting {
        return tip_bits;
    }

    match ancestor_time(get_period_start_height(height, interval)) {
        Some(first_block_time) => calculate_next_difficulty(tip_bits, first_block_time, tip_time, params),
        None => tip_bits,
    }
}

/// Check if difficulty should be adjusted at this height
pub fn should_adjust_difficulty(height: u32, interval: u32) -> bool {
    interval > 0 && height > 0 && height % interval == 0
}

/// Get the height of the first block in the period ending at `height`
pub fn get_period_start_height(height: u32, interval: u32) -> u32 {
    height.saturating_sub(interval)
}

/// Decode compact bits, rejecting negative, zero and overflowing encodings
pub fn decode_compact(compact: u32) -> Option<Target> {
    let exponent = compact >> 24;
    let mantissa = compact & 0x007f_ffff;

    if compact & 0x0080_0000 != 0 && mantissa != 0 {
        return None;
    }
    if mantissa == 0 {
        return None;
    }
    let overflow = (exponent > 34)
        || (mantissa > 0xff && exponent > 33)
        || (mantissa > 0xffff && exponent > 32);
    if overflow {
        return None;
    }
    Some(compact_to_target(compact))
}

/// Convert compact difficulty to 256-bit target. Negative and overflowing
/// encodings give a zero target.
pub fn compact_to_target(compact: u32) -> Target {
    let exponent = (compact >> 24) as usize;
    let mantissa = compact & 0x007f_ffff;

    let mut target = [0u8; 32];

    if exponent == 0 || compact & 0x0080_0000 != 0 {
        return target;
    }

    if exponent <= 3 {
        let value = mantissa >> (8 * (3 - exponent));
        target[29] = ((value >> 16) & 0xff) as u8;
        target[30] = ((value >> 8) & 0xff) as u8;
        target[31] = (value & 0xff) as u8;
        return target;
    }

    // mantissa bytes land at positions 32 - exponent .. 32 - exponent + 3,
    // anything shifted above the top byte must be zero
    let bytes = [(mantissa >> 16) as u8, (mantissa >> 8) as u8, mantissa as u8];
    for (i, byte) in bytes.iter().enumerate() {
        let pos = 32 + i as isize - exponent as isize;
        if pos < 0 {
            if *byte != 0 {
                return [0u8; 32];
            }
            continue;
        }
        if (pos as usize) < 32 {
            target[pos as usize] = *byte;
        }
    }

    target
}

/// Convert 256-bit target to compact difficulty
pub fn target_to_compact(target: &Target) -> u32 {
    let first_nonzero = match target.iter().position(|&b| b != 0) {
        Some(i) => i,
        None => return 0,
    };

    let mut exponent = (32 - first_nonzero) as u32;

    let mut mantissa: u32 = 0;
    for i in 0..3 {
        mantissa <<= 8;
        if let Some(&byte) = target.get(first_nonzero + i) {
            mantissa |= byte as u32;
        }
    }

    // Handle negative bit
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        exponent += 1;
    }

    (exponent << 24) | mantissa
}

/// Multiply target by the ratio `numerator / denominator`, saturating at
/// the maximum 256-bit value
pub fn multiply_target(target: &Target, numerator: u64, denominator: u64) -> Target {
    if denominator == 0 {
        return [0xff; 32];
    }

    // 320-bit intermediate so the product cannot overflow
    let mut wide = [0u8; 40];
    let mut carry: u128 = 0;
    for i in (0..40).rev() {
        let byte = if i >= 8 { target[i - 8] as u128 } else { 0 };
        let val = byte * numerator as u128 + carry;
        wide[i] = (val & 0xff) as u8;
        carry = val >> 8;
    }

    let mut remainder: u128 = 0;
    for byte in wide.iter_mut() {
        let cur = (remainder << 8) | *byte as u128;
        *byte = (cur / denominator as u128) as u8;
        remainder = cur % denominator as u128;
    }

    if wide[..8].iter().any(|&b| b != 0) {
        return [0xff; 32];
    }
    let mut result = [0u8; 32];
    result.copy_from_slice(&wide[8..]);
    result
}

/// Whether a hash, read as a little-endian 256-bit number, is at or below
/// the target
pub fn hash_meets_target(hash: &Hash, target: &Target) -> bool {
    let mut value = hash.0;
    value.reverse();
    value <= *target
}

/// Difficulty as a multiple of the `0x1d00ffff` target, for logs
pub fn difficulty_from_bits(bits: u32) -> f64 {
    let target = compact_to_target(bits);
    let mantissa = (bits & 0x007f_ffff) as f64;
    if mantissa == 0.0 || target == [0u8; 32] {
        return 0.0;
    }
    let shift = (bits >> 24) as i32;
    let mut diff = 0x0000_ffff as f64 / mantissa;
    let mut s = shift;
    while s < 29 {
        diff *= 256.0;
        s += 1;
    }
    while s > 29 {
        diff /= 256.0;
        s -= 1;
    }
    diff
}
