//! Difficulty retarget
//!
//! The fractional difficulty follows an exponential moving average toward
//! the target spacing on every block. When it leaves the usable band the
//! integer length steps up or down by one.

use crate::error::PrimeError;
use crate::params::{
    ConsensusParams, FRACTIONAL_DIFFICULTY_MAX, FRACTIONAL_DIFFICULTY_MIN,
    FRACTIONAL_DIFFICULTY_THRESHOLD,
};
use crate::target::Target;

/// Minimal view of a block index entry needed to compute the next target
pub trait BlockIndex {
    fn bits(&self) -> u32;
    /// Block timestamp in seconds
    fn time(&self) -> i64;
    fn prev(&self) -> Option<&Self>;
}

/// Next target from the previous one and the last observed spacing
pub fn next_target(
    prev: Target,
    interval: i64,
    target_spacing: i64,
    actual_spacing: i64,
    params: &ConsensusParams,
) -> Result<Target, PrimeError> {
    let difficulty = prev.fractional_difficulty();

    let numerator = difficulty as i128 * ((interval + 1) * target_spacing) as i128;
    let denominator = ((interval - 1) * target_spacing) as i128 + 2 * actual_spacing as i128;
    // A non-positive denominator only comes from absurd timestamps; it lands on the floor
    let averaged = if denominator > 0 {
        numerator / denominator
    } else {
        FRACTIONAL_DIFFICULTY_MIN as i128
    };
    let mut new_difficulty = averaged.clamp(
        FRACTIONAL_DIFFICULTY_MIN as i128,
        FRACTIONAL_DIFFICULTY_MAX as i128,
    ) as u64;

    log::debug!(
        "next target: actual_spacing={} fractional_difficulty={} new={}",
        actual_spacing,
        difficulty,
        new_difficulty
    );

    let mut next = prev;
    if new_difficulty > FRACTIONAL_DIFFICULTY_THRESHOLD {
        new_difficulty = FRACTIONAL_DIFFICULTY_MIN;
        next = next.increment_length();
    } else if new_difficulty == FRACTIONAL_DIFFICULTY_MIN
        && next.length() > params.target_min_length
    {
        new_difficulty = FRACTIONAL_DIFFICULTY_THRESHOLD;
        next = next.decrement_length(params.target_min_length);
    }

    next.with_fractional_difficulty(new_difficulty).map_err(|_| {
        log::debug!(
            "next target: unable to set fractional difficulty prev={} new={}",
            difficulty,
            new_difficulty
        );
        PrimeError::EncodingOverflow {
            prev: difficulty,
            new: new_difficulty,
        }
    })
}

/// Target required of the block following `last`
///
/// `None` stands for "no previous block" (the genesis block itself).
pub fn next_work_required<B: BlockIndex>(
    last: Option<&B>,
    params: &ConsensusParams,
) -> Result<Target, PrimeError> {
    let Some(prev) = last else {
        return Ok(Target::limit(params));
    };
    let Some(prev_prev) = prev.prev() else {
        // first block
        return Ok(Target::initial(params));
    };
    if prev_prev.prev().is_none() {
        // second block
        return Ok(Target::initial(params));
    }
    if params.no_retargeting {
        return Ok(Target::from_bits(prev.bits()));
    }

    let actual_spacing = prev.time() - prev_prev.time();
    next_target(
        Target::from_bits(prev.bits()),
        params.interval(),
        params.target_spacing,
        actual_spacing,
        params,
    )
}

/// Running estimate of the chain length at which work moves to the next
/// integer length, smoothed over 500 blocks
pub fn estimate_work_transition(
    prev_work_transition: u32,
    bits: Target,
    chain_length: Target,
) -> u32 {
    const INTERVAL: u128 = 500;
    let ceiling = Target::from_length(bits.length() + 1).bits() as u128;
    let floor = Target::from_length(bits.length()).bits() as u128;
    let difficulty = bits.fractional_difficulty() as u128;
    let prev = prev_work_transition as u128;

    let estimate = if chain_length.length() > bits.length() {
        let weight = ((INTERVAL - 1) * difficulty) >> 32;
        (prev * weight + 2 * floor) / (weight + 2)
    } else {
        ((INTERVAL - 1) * prev + 2 * ceiling) / (INTERVAL + 1)
    };
    estimate as u32
}
