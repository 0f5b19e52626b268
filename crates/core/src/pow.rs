//! Prime proof-of-work verification, block value and chain work
//!
//! The header hash is taken in internal byte order and read as a
//! little-endian 256-bit integer. The chain origin is that integer times the
//! multiplier carried in the block.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;

use crate::chain::{ChainLengths, ChainType, TestMode, prime_chain_test};
use crate::error::{PrimeError, Rejection};
use crate::params::{
    CENT, ConsensusParams, FRACTIONAL_BITS, FRACTIONAL_DIFFICULTY_MIN, MAX_MINT, MAX_TARGET_LENGTH,
    WORK_TRANSITION_RATIO,
};
use crate::prime_table::PrimeTable;
use crate::primality::fermat_test;
use crate::target::Target;

/// Accepted proof: the longest chain and all three lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainProof {
    pub chain_type: ChainType,
    pub length: Target,
    pub lengths: ChainLengths,
}

/// Header hash as the integer it stands for
pub fn hash_to_biguint(hash: &[u8; 32]) -> BigUint {
    BigUint::from_bytes_le(hash)
}

/// Target, header hash and origin bounds; returns the chain origin
fn check_header_bounds(
    hash: &[u8; 32],
    target: Target,
    multiplier: &BigUint,
    params: &ConsensusParams,
) -> Result<BigUint, Rejection> {
    if target.length() < params.target_min_length || target.length() > MAX_TARGET_LENGTH {
        log::debug!("invalid chain length target {}", target);
        return Err(Rejection::InvalidTarget(target));
    }

    let hash = hash_to_biguint(hash);
    if hash < params.header_hash_limit() {
        log::debug!("block header hash under limit: {:x}", hash);
        return Err(Rejection::HeaderHashUnderLimit);
    }

    let origin = hash * multiplier;
    if origin < params.prime_min() {
        log::debug!("prime too small");
        return Err(Rejection::OriginTooSmall);
    }
    if origin > params.prime_max() {
        log::debug!("prime too big");
        return Err(Rejection::OriginTooBig);
    }
    Ok(origin)
}

/// Cheap header check without any primality testing
///
/// Runs the target, header hash and origin bound checks of
/// [`check_prime_proof_of_work`] so block headers can be screened in bulk.
pub fn check_block_header_integrity(
    hash: &[u8; 32],
    target: Target,
    multiplier: &BigUint,
    params: &ConsensusParams,
) -> Result<(), Rejection> {
    check_header_bounds(hash, target, multiplier, params).map(|_| ())
}

/// Verify the prime chain certified by `multiplier` for a block header
pub fn check_prime_proof_of_work(
    hash: &[u8; 32],
    target: Target,
    multiplier: &BigUint,
    params: &ConsensusParams,
) -> Result<ChainProof, Rejection> {
    let origin = check_header_bounds(hash, target, multiplier, params)?;

    let (lengths, accepted) = prime_chain_test(&origin, target, TestMode::FermatOnly)?;
    if !accepted {
        let (chain_type, length) = lengths.longest();
        log::debug!("failed prime chain test target={} length={}", target, lengths);
        return Err(Rejection::ChainTooShort {
            target,
            chain_type,
            length,
        });
    }

    let (strict, accepted) = prime_chain_test(&origin, target, TestMode::Strict)?;
    if !accepted || strict != lengths {
        log::debug!(
            "failed strict double check target={} length={} strict={}",
            target,
            lengths,
            strict
        );
        return Err(Rejection::StrictMismatch { target });
    }

    let (chain_type, length) = lengths.longest();

    // A multiplier with a spare factor of two could have certified a longer chain
    if multiplier.is_even() && (&origin % 4u32).is_zero() {
        let halved = &origin >> 1;
        let (extended, accepted) = prime_chain_test(&halved, target, TestMode::Strict)?;
        if accepted && extended.any_longer_than(length) {
            log::debug!(
                "prime certificate not normalized target={} length={} extend={}",
                target,
                lengths,
                extended
            );
            return Err(Rejection::NotNormalized { target });
        }
    }

    Ok(ChainProof {
        chain_type,
        length,
        lengths,
    })
}

/// Version 0.2 headers required the header hash itself to be a probable prime
pub fn check_proof_of_work_v02_compatibility(hash: &[u8; 32]) -> Result<bool, PrimeError> {
    Ok(fermat_test(&hash_to_biguint(hash))?.is_probable_prime())
}

/// Mint for a block at `target`: 999 coins divided by the squared difficulty
pub fn block_subsidy(target: Target, params: &ConsensusParams) -> Result<u64, PrimeError> {
    if target.length() < params.target_min_length {
        log::debug!("length below minimum required, bits={:08x}", target.bits());
        return Err(PrimeError::MintBelowMinimum(target));
    }
    let bits = target.bits() as u128;
    if bits == 0 {
        return Err(PrimeError::MintOverLimit(target));
    }
    let mint = ((MAX_MINT as u128) << FRACTIONAL_BITS) / bits;
    let mint = (mint << FRACTIONAL_BITS) / bits;
    let mint = mint / CENT as u128 * CENT as u128;
    if mint > MAX_MINT as u128 {
        log::debug!("mint value over limit, bits={:08x}", target.bits());
        return Err(PrimeError::MintOverLimit(target));
    }
    Ok(mint as u64)
}

/// Block value: mint plus collected fees
pub fn block_value(target: Target, fees: u64, params: &ConsensusParams) -> Result<u64, PrimeError> {
    Ok(block_subsidy(target, params)?.saturating_add(fees))
}

/// Chain work contributed by a block at `target`
///
/// Work grows by the transition ratio for every length above the minimum,
/// scaled within a length by the fractional difficulty.
pub fn block_proof(target: Target, params: &ConsensusParams) -> BigUint {
    let difficulty = target.fractional_difficulty();
    let ratio = WORK_TRANSITION_RATIO as u64;
    let steps = target.length().saturating_sub(params.target_min_length);

    let mut work = BigUint::from(256u32) * BigUint::from(WORK_TRANSITION_RATIO).pow(steps);
    work *= BigUint::from(ratio) * difficulty;
    work /= BigUint::from((ratio - 1) * FRACTIONAL_DIFFICULTY_MIN + difficulty);
    work
}

/// Origin written as `k*p#` with the largest primorial dividing it
pub fn origin_primorial_form(origin: &BigUint, table: &PrimeTable) -> String {
    table.primorial_form(origin)
}
