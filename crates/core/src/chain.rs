//! Cunningham and bi-twin chain tests
//!
//! For a chain origin `o`:
//! - first kind walks `o-1, 2(o-1)+1, ...`
//! - second kind walks `o+1, 2(o+1)-1, ...`
//! - bi-twin interleaves both: `o-1, o+1, 2o-1, 2o+1, ...`
//!
//! Every chain length carries the fractional contribution of the candidate
//! that broke the chain.

use core::fmt;

use num_bigint::BigUint;

use crate::error::PrimeError;
use crate::primality::{CunninghamKind, Primality, euler_lagrange_lifchitz_test, fermat_test};
use crate::target::Target;

/// Prime chain type, numbered as in block diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainType {
    Cunningham1 = 1,
    Cunningham2 = 2,
    BiTwin = 3,
}

impl ChainType {
    pub fn label(&self) -> &'static str {
        match self {
            ChainType::Cunningham1 => "1CC",
            ChainType::Cunningham2 => "2CC",
            ChainType::BiTwin => "TWN",
        }
    }
}

impl TryFrom<u32> for ChainType {
    type Error = PrimeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ChainType::Cunningham1),
            2 => Ok(ChainType::Cunningham2),
            3 => Ok(ChainType::BiTwin),
            other => Err(PrimeError::InvalidCandidateType(other)),
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Chain name such as `TWN06.e0d80e`
pub fn chain_name(chain_type: ChainType, length: Target) -> String {
    format!("{}{}", chain_type, length)
}

/// Which test to apply after the first element of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    /// Fermat test throughout; cheap, used while mining
    FermatOnly,
    /// Euler-Lagrange-Lifchitz test for every element after the first
    Strict,
}

/// Outcome of a single Cunningham chain walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CunninghamChain {
    pub length: Target,
    /// Integer length reached at least 2
    pub found: bool,
}

/// Walk a Cunningham chain starting at `n`
pub fn cunningham_chain_test(
    n: &BigUint,
    kind: CunninghamKind,
    mode: TestMode,
) -> Result<CunninghamChain, PrimeError> {
    let mut length = Target::default();

    if let Primality::Composite { fractional } = fermat_test(n)? {
        return Ok(CunninghamChain {
            length: length.with_fractional(fractional),
            found: false,
        });
    }

    let mut candidate = n.clone();
    loop {
        length = length.increment_length();
        candidate = &candidate + &candidate;
        match kind {
            CunninghamKind::First => candidate += 1u32,
            CunninghamKind::Second => candidate -= 1u32,
        }
        let outcome = match mode {
            TestMode::FermatOnly => fermat_test(&candidate)?,
            TestMode::Strict => euler_lagrange_lifchitz_test(&candidate, kind)?,
        };
        if let Primality::Composite { fractional } = outcome {
            length = length.with_fractional(fractional);
            break;
        }
    }

    Ok(CunninghamChain {
        length,
        found: length.length() >= 2,
    })
}

/// Lengths of the three chain types rooted at one origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainLengths {
    pub cunningham1: Target,
    pub cunningham2: Target,
    pub bi_twin: Target,
}

impl ChainLengths {
    /// Combine both Cunningham walks; a bi-twin chain may end on a single
    /// first-kind prime, giving it odd length
    pub fn from_cunningham(cunningham1: Target, cunningham2: Target) -> Self {
        let bi_twin = if cunningham1.length() > cunningham2.length() {
            cunningham2.bits().wrapping_add(Target::from_length(cunningham2.length() + 1).bits())
        } else {
            cunningham1.bits().wrapping_add(Target::from_length(cunningham1.length()).bits())
        };
        Self {
            cunningham1,
            cunningham2,
            bi_twin: Target::from_bits(bi_twin),
        }
    }

    /// Any of the three lengths meets `target`
    pub fn meets(&self, target: Target) -> bool {
        self.cunningham1 >= target || self.cunningham2 >= target || self.bi_twin >= target
    }

    /// Longest chain; ties go to the later type
    pub fn longest(&self) -> (ChainType, Target) {
        let mut best = (ChainType::Cunningham1, self.cunningham1);
        if self.cunningham2 > best.1 {
            best = (ChainType::Cunningham2, self.cunningham2);
        }
        if self.bi_twin > best.1 {
            best = (ChainType::BiTwin, self.bi_twin);
        }
        best
    }

    /// Any of the three is longer than `length`
    pub fn any_longer_than(&self, length: Target) -> bool {
        self.cunningham1 > length || self.cunningham2 > length || self.bi_twin > length
    }
}

impl fmt::Display for ChainLengths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.cunningham1, self.cunningham2, self.bi_twin)
    }
}

/// Test all three chain types rooted at `origin`
///
/// Returns the lengths and whether any of them meets `target`.
pub fn prime_chain_test(
    origin: &BigUint,
    target: Target,
    mode: TestMode,
) -> Result<(ChainLengths, bool), PrimeError> {
    let (first, second) = walk_both(origin, mode);
    let lengths = ChainLengths::from_cunningham(first?.length, second?.length);
    Ok((lengths, lengths.meets(target)))
}

#[cfg(feature = "parallel")]
fn walk_both(
    origin: &BigUint,
    mode: TestMode,
) -> (
    Result<CunninghamChain, PrimeError>,
    Result<CunninghamChain, PrimeError>,
) {
    rayon::join(
        || cunningham_chain_test(&(origin - 1u32), CunninghamKind::First, mode),
        || cunningham_chain_test(&(origin + 1u32), CunninghamKind::Second, mode),
    )
}

#[cfg(not(feature = "parallel"))]
fn walk_both(
    origin: &BigUint,
    mode: TestMode,
) -> (
    Result<CunninghamChain, PrimeError>,
    Result<CunninghamChain, PrimeError>,
) {
    (
        cunningham_chain_test(&(origin - 1u32), CunninghamKind::First, mode),
        cunningham_chain_test(&(origin + 1u32), CunninghamKind::Second, mode),
    )
}

/// Miner variant: test only the chain type the sieve left open
///
/// A bi-twin candidate only walks the second kind once the first kind found
/// a chain. Returns the chain length and whether it meets `target`.
pub fn prime_chain_test_for_miner(
    origin: &BigUint,
    target: Target,
    candidate_type: ChainType,
) -> Result<(Target, bool), PrimeError> {
    let length = match candidate_type {
        ChainType::Cunningham1 => {
            cunningham_chain_test(&(origin - 1u32), CunninghamKind::First, TestMode::Strict)?.length
        }
        ChainType::Cunningham2 => {
            cunningham_chain_test(&(origin + 1u32), CunninghamKind::Second, TestMode::Strict)?
                .length
        }
        ChainType::BiTwin => {
            let first =
                cunningham_chain_test(&(origin - 1u32), CunninghamKind::First, TestMode::Strict)?;
            if first.found {
                let second = cunningham_chain_test(
                    &(origin + 1u32),
                    CunninghamKind::Second,
                    TestMode::Strict,
                )?;
                ChainLengths::from_cunningham(first.length, second.length).bi_twin
            } else {
                Target::default()
            }
        }
    };
    Ok((length, length >= target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn test_first_kind_chain_from_two() {
        // 89, 179, 359, 719, 1439, 2879 is a first-kind chain of length 6
        let chain =
            cunningham_chain_test(&big(89), CunninghamKind::First, TestMode::FermatOnly).unwrap();
        assert_eq!(chain.length.length(), 6);
        assert!(chain.found);
        let strict =
            cunningham_chain_test(&big(89), CunninghamKind::First, TestMode::Strict).unwrap();
        assert_eq!(strict, chain);
    }

    #[test]
    fn test_second_kind_chain() {
        // 1531, 3061, 6121, 12241, 24481 is a second-kind chain of length 5
        let chain =
            cunningham_chain_test(&big(1531), CunninghamKind::Second, TestMode::Strict).unwrap();
        assert_eq!(chain.length.length(), 5);
        assert!(chain.found);
    }

    #[test]
    fn test_composite_start() {
        let chain =
            cunningham_chain_test(&big(15), CunninghamKind::First, TestMode::FermatOnly).unwrap();
        assert_eq!(chain.length, Target::from_bits(0xbbbbbb));
        assert!(!chain.found);
    }

    #[test]
    fn test_single_prime_is_not_a_chain() {
        // 7 is prime, 15 is not
        let chain =
            cunningham_chain_test(&big(7), CunninghamKind::First, TestMode::FermatOnly).unwrap();
        assert_eq!(chain.length, Target::from_bits(0x01bbbbbb));
        assert!(!chain.found);
    }

    #[test]
    fn test_bi_twin_interleave() {
        let c1 = Target::from_bits(0x03e0d80e);
        let c2 = Target::from_bits(0x03a061bd);
        // Equal integer lengths: extend the first kind by its own length
        let lengths = ChainLengths::from_cunningham(c1, c2);
        assert_eq!(lengths.bi_twin, Target::from_bits(0x06e0d80e));

        // First kind longer: second kind plus one more unit
        let lengths = ChainLengths::from_cunningham(Target::from_bits(0x04000001), c2);
        assert_eq!(lengths.bi_twin, Target::from_bits(0x07a061bd));

        // Second kind longer
        let lengths = ChainLengths::from_cunningham(c2, Target::from_bits(0x05000000));
        assert_eq!(lengths.bi_twin, Target::from_bits(0x06a061bd));
    }

    #[test]
    fn test_longest_prefers_later_type_on_tie() {
        let lengths = ChainLengths {
            cunningham1: Target::from_bits(0x03000000),
            cunningham2: Target::from_bits(0x03000000),
            bi_twin: Target::from_bits(0x02000000),
        };
        // Strict comparison: equal lengths keep the earlier winner
        assert_eq!(lengths.longest(), (ChainType::Cunningham1, Target::from_bits(0x03000000)));

        let lengths = ChainLengths {
            cunningham1: Target::from_bits(0x03000000),
            cunningham2: Target::from_bits(0x03000001),
            bi_twin: Target::from_bits(0x03000001),
        };
        assert_eq!(lengths.longest(), (ChainType::Cunningham2, Target::from_bits(0x03000001)));
    }

    #[test]
    fn test_chain_type_conversion() {
        assert_eq!(ChainType::try_from(1).unwrap(), ChainType::Cunningham1);
        assert_eq!(ChainType::try_from(3).unwrap(), ChainType::BiTwin);
        assert_eq!(ChainType::try_from(0), Err(PrimeError::InvalidCandidateType(0)));
        assert_eq!(ChainType::try_from(4), Err(PrimeError::InvalidCandidateType(4)));
    }

    #[test]
    fn test_chain_name() {
        assert_eq!(chain_name(ChainType::BiTwin, Target::from_bits(0x06e0d80e)), "TWN06.e0d80e");
        assert_eq!(chain_name(ChainType::Cunningham2, Target::from_length(7)), "2CC07.000000");
    }

    #[test]
    fn test_prime_chain_test_small_origin() {
        // origin 90: 89 starts a first-kind chain of 6, 91 = 7 * 13
        let (lengths, accepted) =
            prime_chain_test(&big(90), Target::from_length(6), TestMode::FermatOnly).unwrap();
        assert_eq!(lengths.cunningham1.length(), 6);
        assert_eq!(lengths.cunningham2.length(), 0);
        assert_eq!(lengths.bi_twin.length(), 1);
        assert!(accepted);
        assert_eq!(lengths.longest().0, ChainType::Cunningham1);

        let (_, accepted) =
            prime_chain_test(&big(90), Target::from_length(7), TestMode::FermatOnly).unwrap();
        assert!(!accepted);
    }

    #[test]
    fn test_miner_variant_matches_full_test() {
        let origin = big(90);
        let target = Target::from_length(2);
        let (full, _) = prime_chain_test(&origin, target, TestMode::Strict).unwrap();
        let (c1, found) =
            prime_chain_test_for_miner(&origin, target, ChainType::Cunningham1).unwrap();
        assert_eq!(c1, full.cunningham1);
        assert!(found);
        let (c2, _) = prime_chain_test_for_miner(&origin, target, ChainType::Cunningham2).unwrap();
        assert_eq!(c2, full.cunningham2);
        let (twin, _) = prime_chain_test_for_miner(&origin, target, ChainType::BiTwin).unwrap();
        assert_eq!(twin, full.bi_twin);
    }
}
