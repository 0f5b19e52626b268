//! Prime-Chain Prover Library
//!
//! Miner and verifier for a proof-of-work whose work unit is a chain of
//! probable primes: Cunningham chains of the first and second kind and
//! bi-twin chains rooted at `header_hash * multiplier`.
//!
//! # Overview
//!
//! The consensus engine lives in [`algorithm`] (the `primechain-core`
//! crate). This crate adds the application layer around it: a JSON
//! [`config`] file and a multi-threaded [`worker`] pool used by the
//! `primechain` binary.
//!
//! # Example
//!
//! ```rust
//! use primechain::algorithm::{BlockHeader, Network, chain_name, check_prime_proof_of_work};
//!
//! // Verify the main network genesis block
//! let genesis = BlockHeader::genesis(Network::Main);
//! let proof = check_prime_proof_of_work(
//!     &genesis.header_hash(),
//!     genesis.target(),
//!     &genesis.multiplier,
//!     &Network::Main.params(),
//! )
//! .unwrap();
//!
//! assert_eq!(chain_name(proof.chain_type, proof.length), "TWN06.e0d80e");
//! ```

// Re-export the core algorithm
pub use primechain_core as algorithm;

pub mod config;
pub mod worker;

// Convenience re-exports
pub use algorithm::{
    BlockHeader, ChainType, Network, Rejection, Target, check_prime_proof_of_work,
    next_work_required,
};
pub use config::MinerConfig;
pub use worker::{MiningJob, MiningPool, ProofReport};
