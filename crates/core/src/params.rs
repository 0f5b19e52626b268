//! Prime-chain consensus parameters
//!
//! The bit layout and thresholds here are part of network consensus and must
//! match existing nodes exactly.

use num_bigint::BigUint;
use num_traits::One;

/// Number of fractional bits in a target / chain length value
pub const FRACTIONAL_BITS: u32 = 24;

/// Mask selecting the fractional part of a target
pub const TARGET_FRACTIONAL_MASK: u32 = (1 << FRACTIONAL_BITS) - 1;

/// Mask selecting the integer length part of a target
pub const TARGET_LENGTH_MASK: u32 = !TARGET_FRACTIONAL_MASK;

/// Upper bound of the fractional difficulty scale (2^56)
pub const FRACTIONAL_DIFFICULTY_MAX: u64 = 1 << (FRACTIONAL_BITS + 32);

/// Lower bound of the fractional difficulty scale (2^32)
pub const FRACTIONAL_DIFFICULTY_MIN: u64 = 1 << 32;

/// Fractional difficulty above which the integer length steps up (2^40)
pub const FRACTIONAL_DIFFICULTY_THRESHOLD: u64 = 1 << (8 + 32);

/// Work multiplier between consecutive integer lengths
pub const WORK_TRANSITION_RATIO: u32 = 32;

/// Largest integer chain length a block may claim
pub const MAX_TARGET_LENGTH: u32 = 99;

/// Largest sieve, in multipliers
pub const MAX_SIEVE_SIZE: usize = 1_000_000;

/// The prime table covers every prime below this bound
pub const PRIME_TABLE_LIMIT: usize = MAX_SIEVE_SIZE;

/// Header hashes below 2^255 are rejected
pub const HEADER_HASH_LIMIT_BITS: u32 = 255;

/// Chain origins must be at least 2^255
pub const PRIME_MIN_BITS: u32 = 255;

/// Chain origins must not exceed 2^2000 - 1
pub const PRIME_MAX_BITS: u32 = 2000;

/// Smallest currency unit per coin
pub const COIN: u64 = 100_000_000;

/// One cent; mint values are rounded down to it
pub const CENT: u64 = 1_000_000;

/// Highest mint value
pub const MAX_MINT: u64 = 999 * COIN;

/// Network the parameters belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Production network
    Main,
    /// Public test network
    Test,
    /// Local regression-test network
    Regtest,
}

impl Network {
    /// Consensus parameters for this network
    pub fn params(&self) -> ConsensusParams {
        match self {
            Network::Main => ConsensusParams {
                network: *self,
                target_min_length: 6,
                target_initial_length: 7,
                target_spacing: 60,
                target_timespan: 7 * 24 * 60 * 60,
                no_retargeting: false,
            },
            Network::Test => ConsensusParams {
                network: *self,
                target_min_length: 2,
                target_initial_length: 5,
                target_spacing: 60,
                target_timespan: 7 * 24 * 60 * 60,
                no_retargeting: false,
            },
            Network::Regtest => ConsensusParams {
                network: *self,
                target_min_length: 2,
                target_initial_length: 5,
                target_spacing: 60,
                target_timespan: 7 * 24 * 60 * 60,
                no_retargeting: true,
            },
        }
    }

    /// Genesis block fields of this network
    pub fn genesis(&self) -> GenesisInfo {
        const PRIMORIAL_23: u64 = 2 * 3 * 5 * 7 * 11 * 13 * 17 * 19 * 23;
        match self {
            Network::Main => GenesisInfo {
                version: 2,
                time: 1373064429,
                nonce: 383,
                bits: 6 << FRACTIONAL_BITS,
                multiplier: 532541 * PRIMORIAL_23,
                merkle_root: GENESIS_MERKLE_ROOT,
            },
            Network::Test => GenesisInfo {
                version: 2,
                time: 1373063882,
                nonce: 1513,
                bits: 6 << FRACTIONAL_BITS,
                multiplier: 585641 * PRIMORIAL_23,
                merkle_root: GENESIS_MERKLE_ROOT,
            },
            Network::Regtest => GenesisInfo {
                version: 1,
                time: 1296688602,
                nonce: 2,
                bits: 0x207fffff,
                multiplier: 585641 * PRIMORIAL_23,
                merkle_root: GENESIS_MERKLE_ROOT,
            },
        }
    }

    /// Parse network from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Some(Network::Main),
            "test" | "testnet" => Some(Network::Test),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Regtest => "regtest",
        }
    }
}

/// Merkle root shared by all genesis blocks (internal byte order)
const GENESIS_MERKLE_ROOT: [u8; 32] = [
    0xff, 0xc9, 0x05, 0x0e, 0x83, 0x4e, 0x51, 0xd2, 0xeb, 0x40, 0xec, 0xda, 0x53, 0x08, 0x71, 0x4f,
    0x55, 0x74, 0x3d, 0x3c, 0x74, 0xae, 0xd0, 0x12, 0x94, 0xbb, 0xff, 0x1d, 0xb6, 0x0e, 0xa3, 0xac,
];

/// Fields needed to rebuild a genesis header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenesisInfo {
    pub version: i32,
    pub time: u32,
    pub nonce: u32,
    pub bits: u32,
    pub multiplier: u64,
    pub merkle_root: [u8; 32],
}

/// Network-wide consensus parameters consumed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusParams {
    pub network: Network,
    /// Integer chain length floor
    pub target_min_length: u32,
    /// Length used for the first blocks after genesis
    pub target_initial_length: u32,
    /// Target block spacing in seconds
    pub target_spacing: i64,
    /// Averaging window of the retarget in seconds
    pub target_timespan: i64,
    /// Keep the previous target instead of retargeting
    pub no_retargeting: bool,
}

impl ConsensusParams {
    /// Retarget interval in blocks
    pub fn interval(&self) -> i64 {
        self.target_timespan / self.target_spacing
    }

    /// Minimum header hash value (2^255)
    pub fn header_hash_limit(&self) -> BigUint {
        BigUint::one() << HEADER_HASH_LIMIT_BITS
    }

    /// Smallest allowed chain origin
    pub fn prime_min(&self) -> BigUint {
        BigUint::one() << PRIME_MIN_BITS
    }

    /// Largest allowed chain origin
    pub fn prime_max(&self) -> BigUint {
        (BigUint::one() << PRIME_MAX_BITS) - 1u32
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Network::Main.params()
    }
}
