//! Probable primality tests producing fractional chain lengths
//!
//! Both tests use base 2. When a candidate fails, the distance of the Fermat
//! remainder from 1 is mapped to a 24-bit fractional length, a continuous
//! measure of how close the candidate came to extending the chain.

use core::fmt;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::PrimeError;
use crate::params::FRACTIONAL_BITS;
use crate::prime_table::PrimeTable;

/// Direction of a Cunningham chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CunninghamKind {
    /// n, 2n+1, 4n+3, ... (Sophie Germain direction)
    First,
    /// n, 2n-1, 4n-3, ...
    Second,
}

impl fmt::Display for CunninghamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl CunninghamKind {
    pub fn label(&self) -> &'static str {
        match self {
            CunninghamKind::First => "first kind",
            CunninghamKind::Second => "second kind",
        }
    }
}

/// Outcome of a single probable primality test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primality {
    ProbablePrime,
    /// Composite; the low 24 bits of the chain length it leaves behind
    Composite { fractional: u32 },
}

impl Primality {
    #[inline]
    pub fn is_probable_prime(&self) -> bool {
        matches!(self, Primality::ProbablePrime)
    }
}

/// Fermat base-2 test: 2^(n-1) = 1 (mod n)
pub fn fermat_test(n: &BigUint) -> Result<Primality, PrimeError> {
    if n < &BigUint::from(2u32) {
        return Ok(Primality::Composite { fractional: 0 });
    }
    let r = BigUint::from(2u32).modpow(&(n - 1u32), n);
    if r.is_one() {
        return Ok(Primality::ProbablePrime);
    }
    let fractional = fractional_length(n, &r)?;
    Ok(Primality::Composite { fractional })
}

/// Euler-Lagrange-Lifchitz test for n = 2p+1 (first kind) or n = 2p-1 (second kind)
pub fn euler_lagrange_lifchitz_test(
    n: &BigUint,
    kind: CunninghamKind,
) -> Result<Primality, PrimeError> {
    if n < &BigUint::from(2u32) {
        return Ok(Primality::Composite { fractional: 0 });
    }
    let e: BigUint = (n - 1u32) >> 1;
    let r = BigUint::from(2u32).modpow(&e, n);
    let residue = n.iter_u32_digits().next().unwrap_or(0) & 7;

    let passed = match (kind, residue) {
        // Euler & Lagrange
        (CunninghamKind::First, 7) => r.is_one(),
        // Lifchitz
        (CunninghamKind::First, 3) => &r + 1u32 == *n,
        (CunninghamKind::Second, 5) => &r + 1u32 == *n,
        (CunninghamKind::Second, 1) => r.is_one(),
        _ => {
            log::debug!("invalid n % 8 = {}, {}", residue, kind);
            return Err(PrimeError::InvalidResidueClass {
                residue,
                kind: kind.label(),
            });
        }
    };
    if passed {
        return Ok(Primality::ProbablePrime);
    }

    // Derive the Fermat remainder
    let r = (&r * &r) % n;
    let fractional = fractional_length(n, &r)?;
    Ok(Primality::Composite { fractional })
}

/// Trial division by table primes below `trial_division_limit`, then Fermat
///
/// Returns `false` for any candidate with a small factor, without running
/// the modular exponentiation.
pub fn probable_primality_test_with_trial_division(
    candidate: &BigUint,
    trial_division_limit: u32,
    table: &PrimeTable,
) -> Result<bool, PrimeError> {
    for &p in table.primes() {
        if p >= trial_division_limit {
            break;
        }
        if (candidate % p).is_zero() {
            return Ok(false);
        }
    }
    Ok(fermat_test(candidate)?.is_probable_prime())
}

/// ((n - r) << 24) / n, which must fit in 24 bits
fn fractional_length(n: &BigUint, r: &BigUint) -> Result<u32, PrimeError> {
    let fractional: BigUint = ((n - r) << FRACTIONAL_BITS) / n;
    match fractional.to_u64() {
        Some(value) if value < 1 << FRACTIONAL_BITS => Ok(value as u32),
        other => {
            log::warn!("fractional assert n={} r={}", n, r);
            Err(PrimeError::FractionalOverflow(other.unwrap_or(u64::MAX)))
        }
    }
}
