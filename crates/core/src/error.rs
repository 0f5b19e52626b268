//! Error and rejection types
//!
//! `PrimeError` covers malformed encodings and broken invariants. `Rejection`
//! is the ordinary "proof of work invalid" outcome of the verifier.

use thiserror::Error;

use crate::chain::ChainType;
use crate::target::Target;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimeError {
    #[error("invalid chain length {0}")]
    InvalidLength(u32),

    #[error("fractional difficulty {0} out of range")]
    DifficultyOutOfRange(u64),

    #[error("fractional length {0:#x} does not fit in 24 bits")]
    FractionalOverflow(u64),

    #[error("invalid n % 8 = {residue} for {kind} chain")]
    InvalidResidueClass { residue: u32, kind: &'static str },

    #[error("unable to encode fractional difficulty prev={prev} new={new}")]
    EncodingOverflow { prev: u64, new: u64 },

    #[error("length below minimum required, bits={0}")]
    MintBelowMinimum(Target),

    #[error("mint value over limit, bits={0}")]
    MintOverLimit(Target),

    #[error("invalid candidate type {0}")]
    InvalidCandidateType(u32),

    #[error("no modular inverse of {value} modulo {prime}")]
    NoModularInverse { value: u64, prime: u32 },
}

/// Why a prime proof-of-work was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("invalid chain length target {0}")]
    InvalidTarget(Target),

    #[error("block header hash under limit")]
    HeaderHashUnderLimit,

    #[error("prime too small")]
    OriginTooSmall,

    #[error("prime too big")]
    OriginTooBig,

    #[error("failed prime chain test target={target} longest={chain_type}{length}")]
    ChainTooShort {
        target: Target,
        chain_type: ChainType,
        length: Target,
    },

    #[error("failed strict double check target={target}")]
    StrictMismatch { target: Target },

    #[error("prime certificate not normalized target={target}")]
    NotNormalized { target: Target },

    #[error("primality engine: {0}")]
    Engine(#[from] PrimeError),
}
