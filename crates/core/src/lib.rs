//! # Prime-Chain Proof-of-Work Core
//!
//! Validation and mining engine for a proof-of-work where the work is a
//! chain of probable primes rooted at `header_hash * multiplier`.
//!
//! ## Chain Types
//!
//! For a chain origin `o`:
//!
//! - **Cunningham chain, first kind** (`1CC`): `o-1, 2o-1, 4o-1, ...`
//! - **Cunningham chain, second kind** (`2CC`): `o+1, 2o+1, 4o+1, ...`
//! - **Bi-twin chain** (`TWN`): `o-1, o+1, 2o-1, 2o+1, ...`
//!
//! ## Difficulty Encoding
//!
//! Targets and chain lengths share one 32-bit encoding: integer length in
//! the top 8 bits, a 24-bit fractional length below it:
//!
//! ```text
//! bits = length << 24 | fractional
//!        ^^^^^^         ^^^^^^^^^^
//!        primes         how far the breaking candidate got (Fermat remainder)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use primechain_core::{BlockHeader, Network, check_prime_proof_of_work};
//!
//! let genesis = BlockHeader::genesis(Network::Main);
//! let proof = check_prime_proof_of_work(
//!     &genesis.header_hash(),
//!     genesis.target(),
//!     &genesis.multiplier,
//!     &Network::Main.params(),
//! )
//! .unwrap();
//! assert_eq!(proof.length.to_string(), "06.e0d80e");
//! ```
//!
//! ## Mining
//!
//! [`MinerContext`] drives one mining thread: it weaves a [`Sieve`] over
//! candidate multipliers and tests the survivors in short time slices,
//! polling a [`TipWatch`] between candidates.

mod block;
mod chain;
mod error;
mod miner;
mod params;
mod pow;
mod primality;
mod prime_table;
mod retarget;
mod sieve;
mod target;

#[cfg(feature = "ffi")]
mod ffi;

pub use block::{
    BlockHeader, HEADER_SIZE, double_sha256, hash_from_display_hex, hash_to_display_hex,
    serialize_multiplier,
};
pub use chain::{
    ChainLengths, ChainType, CunninghamChain, TestMode, chain_name, cunningham_chain_test,
    prime_chain_test, prime_chain_test_for_miner,
};
pub use error::{PrimeError, Rejection};
pub use miner::{
    MineOutcome, MineRound, MinerContext, MinerOptions, MinerTuning, NONCE_LIMIT, TipWatch,
    find_header_nonce,
};
pub use params::*;
pub use pow::{
    ChainProof, block_proof, block_subsidy, block_value, check_block_header_integrity,
    check_prime_proof_of_work, check_proof_of_work_v02_compatibility, hash_to_biguint,
    origin_primorial_form,
};
pub use primality::{
    CunninghamKind, Primality, euler_lagrange_lifchitz_test, fermat_test,
    probable_primality_test_with_trial_division,
};
pub use prime_table::PrimeTable;
pub use retarget::{BlockIndex, estimate_work_transition, next_target, next_work_required};
pub use sieve::{Candidate, Sieve, SieveState};
pub use target::Target;

pub use num_bigint::BigUint;
