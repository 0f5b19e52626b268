//! Fractional-length target codec
//!
//! A target (and a chain length) packs an integer prime chain length in the
//! top 8 bits and a fractional length in the low 24 bits:
//!
//! ```text
//! 31        24 23                          0
//! +-----------+----------------------------+
//! |  length   |        fractional          |
//! +-----------+----------------------------+
//! ```
//!
//! Comparing raw values orders targets from easiest to hardest.

use core::fmt;

use crate::error::PrimeError;
use crate::params::*;

/// 32-bit fractional-length value (difficulty target or chain length)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(u32);

impl Target {
    /// Wrap a raw 32-bit value
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw 32-bit value, as stored in block headers
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Target of exactly `length` with zero fractional part
    #[inline]
    pub const fn from_length(length: u32) -> Self {
        Self(length << FRACTIONAL_BITS)
    }

    /// Easiest target the network accepts
    pub fn limit(params: &ConsensusParams) -> Self {
        Self::from_length(params.target_min_length)
    }

    /// Target of the first blocks after genesis
    pub fn initial(params: &ConsensusParams) -> Self {
        Self::from_length(params.target_initial_length)
    }

    /// Integer chain length
    #[inline]
    pub const fn length(self) -> u32 {
        (self.0 & TARGET_LENGTH_MASK) >> FRACTIONAL_BITS
    }

    /// Fractional chain length (low 24 bits)
    #[inline]
    pub const fn fractional(self) -> u32 {
        self.0 & TARGET_FRACTIONAL_MASK
    }

    /// Replace the integer length, keeping the fractional part
    pub fn with_length(self, length: u32) -> Result<Self, PrimeError> {
        if length >= 0xff {
            return Err(PrimeError::InvalidLength(length));
        }
        Ok(Self((self.0 & TARGET_FRACTIONAL_MASK) | (length << FRACTIONAL_BITS)))
    }

    /// Add one length unit; the caller bounds the length
    #[inline]
    pub const fn increment_length(self) -> Self {
        Self(self.0.wrapping_add(1 << FRACTIONAL_BITS))
    }

    /// Remove one length unit unless already at `min_length`
    #[inline]
    pub const fn decrement_length(self, min_length: u32) -> Self {
        if self.length() > min_length {
            Self(self.0 - (1 << FRACTIONAL_BITS))
        } else {
            self
        }
    }

    /// Replace the fractional part, keeping the integer length
    #[inline]
    pub(crate) const fn with_fractional(self, fractional: u32) -> Self {
        Self((self.0 & TARGET_LENGTH_MASK) | (fractional & TARGET_FRACTIONAL_MASK))
    }

    /// Map the fractional part onto the difficulty scale `[2^32, 2^56]`
    ///
    /// Higher values are closer to the next integer length.
    #[inline]
    pub const fn fractional_difficulty(self) -> u64 {
        FRACTIONAL_DIFFICULTY_MAX / ((1u64 << FRACTIONAL_BITS) - self.fractional() as u64)
    }

    /// Inverse of [`Target::fractional_difficulty`], keeping the length
    pub fn with_fractional_difficulty(self, difficulty: u64) -> Result<Self, PrimeError> {
        if difficulty < FRACTIONAL_DIFFICULTY_MIN {
            return Err(PrimeError::DifficultyOutOfRange(difficulty));
        }
        let fractional = FRACTIONAL_DIFFICULTY_MAX / difficulty;
        if fractional > 1 << FRACTIONAL_BITS {
            return Err(PrimeError::DifficultyOutOfRange(difficulty));
        }
        let fractional = (1u64 << FRACTIONAL_BITS) - fractional;
        Ok(self.with_fractional(fractional as u32))
    }

    /// Difficulty as a decimal chain length, for display
    pub fn prime_difficulty(self) -> f64 {
        self.0 as f64 / (1u64 << FRACTIONAL_BITS) as f64
    }
}

impl From<u32> for Target {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Target> for u32 {
    fn from(target: Target) -> Self {
        target.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}.{:06x}", self.length(), self.fractional())
    }
}
