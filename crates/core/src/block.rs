//! Block header hashing
//!
//! The header hash (what the chain origin is built from) covers the 80-byte
//! header without the multiplier. The block hash appends the multiplier, so
//! the certificate is bound to the block's identity.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::params::Network;
use crate::target::Target;

/// Size of the serialized header without the multiplier
pub const HEADER_SIZE: usize = 80;

/// SHA256(SHA256(data))
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Hash in display order (byte-reversed hex)
pub fn hash_to_display_hex(hash: &[u8; 32]) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse a display-order hex hash into internal byte order
pub fn hash_from_display_hex(s: &str) -> Option<[u8; 32]> {
    let mut hash: [u8; 32] = hex::decode(s).ok()?.try_into().ok()?;
    hash.reverse();
    Some(hash)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
    /// Prime chain certificate
    pub multiplier: BigUint,
}

impl BlockHeader {
    /// Genesis header of `network`
    pub fn genesis(network: Network) -> Self {
        let info = network.genesis();
        Self {
            version: info.version,
            prev_hash: [0u8; 32],
            merkle_root: info.merkle_root,
            time: info.time,
            bits: info.bits,
            nonce: info.nonce,
            multiplier: BigUint::from(info.multiplier),
        }
    }

    pub fn target(&self) -> Target {
        Target::from_bits(self.bits)
    }

    /// The 80 header bytes without the multiplier
    pub fn serialize_header(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(&self.prev_hash);
        out[36..68].copy_from_slice(&self.merkle_root);
        out[68..72].copy_from_slice(&self.time.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Hash the chain origin is derived from
    pub fn header_hash(&self) -> [u8; 32] {
        double_sha256(&self.serialize_header())
    }

    /// Block identity, covering the multiplier
    pub fn block_hash(&self) -> [u8; 32] {
        let mut data = self.serialize_header().to_vec();
        serialize_multiplier(&self.multiplier, &mut data);
        double_sha256(&data)
    }
}

/// Multiplier as a length-prefixed little-endian magnitude
///
/// A zero byte is appended when the top bit of the magnitude is set, so the
/// value reads back as non-negative. Zero serializes as an empty vector.
pub fn serialize_multiplier(multiplier: &BigUint, out: &mut Vec<u8>) {
    let mut bytes = if multiplier.bits() == 0 {
        Vec::new()
    } else {
        multiplier.to_bytes_le()
    };
    if bytes.last().is_some_and(|&b| b & 0x80 != 0) {
        bytes.push(0);
    }
    write_compact_size(bytes.len() as u64, out);
    out.extend_from_slice(&bytes);
}

fn write_compact_size(n: u64, out: &mut Vec<u8>) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello");
        assert_eq!(
            hex::encode(hash),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_genesis_hashes() {
        let genesis = BlockHeader::genesis(Network::Main);
        assert_eq!(
            hash_to_display_hex(&genesis.header_hash()),
            "a6d8ded5409f1d1eb0cc3c54f4dd324258cfb5d54fdd2597b0aa227a517a39f1"
        );
        assert_eq!(
            hash_to_display_hex(&genesis.block_hash()),
            "963d17ba4dc753138078a2f56afb3af9674e2546822badff26837db9a0152106"
        );
        assert_eq!(genesis.target(), Target::from_length(6));
    }

    #[test]
    fn test_display_hex_roundtrip() {
        let hash = BlockHeader::genesis(Network::Main).header_hash();
        assert_eq!(hash_from_display_hex(&hash_to_display_hex(&hash)), Some(hash));
        assert_eq!(hash_from_display_hex("abcd"), None);
        assert_eq!(hash_from_display_hex("zz"), None);
    }

    #[test]
    fn test_multiplier_serialization() {
        let mut out = Vec::new();
        serialize_multiplier(&BigUint::from(118806100082670u64), &mut out);
        assert_eq!(out, [6, 0xee, 0x7f, 0x64, 0xb3, 0x0d, 0x6c]);

        // Top bit set gets a sign byte
        let mut out = Vec::new();
        serialize_multiplier(&BigUint::from(0x80u32), &mut out);
        assert_eq!(out, [2, 0x80, 0x00]);

        let mut out = Vec::new();
        serialize_multiplier(&BigUint::from(0u32), &mut out);
        assert_eq!(out, [0]);
    }

    #[test]
    fn test_compact_size() {
        let mut out = Vec::new();
        write_compact_size(0xfc, &mut out);
        write_compact_size(0xfd, &mut out);
        write_compact_size(0x10000, &mut out);
        assert_eq!(out, [0xfc, 0xfd, 0xfd, 0x00, 0xfe, 0x00, 0x00, 0x01, 0x00]);
    }
}
