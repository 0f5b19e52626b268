//! C FFI bindings for embedding the verifier
//!
//! Networks are passed as integers: 0 = main, 1 = test, 2 = regtest.
//! Hashes are 32 bytes in internal byte order; multipliers are little-endian
//! magnitudes.

use core::slice;

use num_bigint::BigUint;

use crate::params::Network;
use crate::pow::{block_value, check_prime_proof_of_work};
use crate::primality::fermat_test;
use crate::retarget::next_target;
use crate::target::Target;

/// Proof accepted
pub const PRIMECHAIN_OK: i32 = 0;
/// Proof rejected or value not representable
pub const PRIMECHAIN_REJECTED: i32 = 1;
/// Null pointer or unknown network
pub const PRIMECHAIN_INVALID_ARGUMENT: i32 = -1;

fn network_from_code(code: u32) -> Option<Network> {
    match code {
        0 => Some(Network::Main),
        1 => Some(Network::Test),
        2 => Some(Network::Regtest),
        _ => None,
    }
}

/// Check a prime proof-of-work
/// - hash: pointer to the 32-byte header hash
/// - multiplier / multiplier_len: little-endian multiplier bytes
/// - chain_type / chain_length: written on acceptance (may be null)
#[unsafe(no_mangle)]
pub extern "C" fn primechain_check_proof(
    network: u32,
    hash: *const u8,
    bits: u32,
    multiplier: *const u8,
    multiplier_len: usize,
    chain_type: *mut u32,
    chain_length: *mut u32,
) -> i32 {
    let Some(network) = network_from_code(network) else {
        return PRIMECHAIN_INVALID_ARGUMENT;
    };
    if hash.is_null() || (multiplier.is_null() && multiplier_len > 0) {
        return PRIMECHAIN_INVALID_ARGUMENT;
    }

    let (hash, multiplier) = unsafe {
        let mut header_hash = [0u8; 32];
        header_hash.copy_from_slice(slice::from_raw_parts(hash, 32));
        let multiplier = if multiplier_len == 0 {
            BigUint::default()
        } else {
            BigUint::from_bytes_le(slice::from_raw_parts(multiplier, multiplier_len))
        };
        (header_hash, multiplier)
    };

    let params = network.params();
    match check_prime_proof_of_work(&hash, Target::from_bits(bits), &multiplier, &params) {
        Ok(proof) => {
            unsafe {
                if !chain_type.is_null() {
                    *chain_type = proof.chain_type as u32;
                }
                if !chain_length.is_null() {
                    *chain_length = proof.length.bits();
                }
            }
            PRIMECHAIN_OK
        }
        Err(_) => PRIMECHAIN_REJECTED,
    }
}

/// Next target after a block spaced `actual_spacing` seconds from its parent
#[unsafe(no_mangle)]
pub extern "C" fn primechain_next_target(
    network: u32,
    bits: u32,
    actual_spacing: i64,
    next_bits: *mut u32,
) -> i32 {
    let Some(network) = network_from_code(network) else {
        return PRIMECHAIN_INVALID_ARGUMENT;
    };
    if next_bits.is_null() {
        return PRIMECHAIN_INVALID_ARGUMENT;
    }
    let params = network.params();
    match next_target(
        Target::from_bits(bits),
        params.interval(),
        params.target_spacing,
        actual_spacing,
        &params,
    ) {
        Ok(next) => {
            unsafe {
                *next_bits = next.bits();
            }
            PRIMECHAIN_OK
        }
        Err(_) => PRIMECHAIN_REJECTED,
    }
}

/// Block value (mint plus fees); 0 for a target the network cannot mint at
#[unsafe(no_mangle)]
pub extern "C" fn primechain_block_value(network: u32, bits: u32, fees: u64) -> u64 {
    network_from_code(network)
        .and_then(|network| block_value(Target::from_bits(bits), fees, &network.params()).ok())
        .unwrap_or(0)
}

/// Benchmark: run N Fermat tests on 320-bit candidates and return total microseconds
#[unsafe(no_mangle)]
pub extern "C" fn primechain_benchmark(iterations: u32) -> u64 {
    use std::time::Instant;

    let base = (BigUint::from(1u32) << 320u32) + 1u32;

    let start = Instant::now();
    for i in 0..iterations {
        let candidate = &base + (i as u64) * 2;
        let _ = fermat_test(&candidate);
    }
    start.elapsed().as_micros() as u64
}

/// Tests per second from a benchmark run
#[unsafe(no_mangle)]
pub extern "C" fn primechain_test_rate(iterations: u32, microseconds: u64) -> f64 {
    if microseconds == 0 {
        return 0.0;
    }
    (iterations as f64) / (microseconds as f64 / 1_000_000.0)
}
