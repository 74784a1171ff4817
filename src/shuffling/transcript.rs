//! Domain-separated SHA-256 hashing for commitments and Fiat-Shamir challenges.

use std::convert::TryFrom;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::group::{encode_points, GroupElement};

pub const DOMAIN_CODEC: &[u8] = b"mental-poker/codec/v1";
pub const DOMAIN_CODEC_POINT: &[u8] = b"mental-poker/codec/point/v1";
pub const DOMAIN_DECK: &[u8] = b"mental-poker/deck/v1";
pub const DOMAIN_SHUFFLE_COMMIT: &[u8] = b"mental-poker/shuffle/commit/v1";
pub const DOMAIN_SHUFFLE_CHALLENGE: &[u8] = b"mental-poker/shuffle/challenge/v1";
pub const DOMAIN_DLEQ_NONCE: &[u8] = b"mental-poker/dleq/nonce/v1";
pub const DOMAIN_DLEQ_CHALLENGE: &[u8] = b"mental-poker/dleq/challenge/v1";

/// 32-byte SHA-256 output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(#[serde(with = "crate::crypto_serde::bytes32")] [u8; 32]);

impl Digest {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Length-prefixed hasher; every field is framed so concatenations cannot collide.
pub struct TranscriptHasher {
    hasher: Sha256,
}

impl TranscriptHasher {
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        write_bytes(&mut hasher, domain);
        Self { hasher }
    }

    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        write_bytes(&mut self.hasher, bytes);
        self
    }

    pub fn append_digest(&mut self, digest: &Digest) -> &mut Self {
        self.hasher.update(digest.as_bytes());
        self
    }

    pub fn append_points(&mut self, points: &[GroupElement]) -> &mut Self {
        write_len(&mut self.hasher, points.len());
        for encoded in encode_points(points) {
            write_bytes(&mut self.hasher, &encoded);
        }
        self
    }

    pub fn finish(self) -> Digest {
        finalize_hash(self.hasher)
    }
}

fn finalize_hash(hasher: Sha256) -> Digest {
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Digest::from(bytes)
}

fn write_len(hasher: &mut Sha256, len: usize) {
    // Lengths here are bounded by deck and field sizes.
    let len_u32 = u32::try_from(len).unwrap_or(u32::MAX);
    hasher.update(len_u32.to_be_bytes());
}

fn write_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    write_len(hasher, bytes.len());
    hasher.update(bytes);
}

/// Digest binding an ordered list of points under `domain`.
pub fn hash_points(domain: &[u8], points: &[GroupElement]) -> Digest {
    let mut transcript = TranscriptHasher::new(domain);
    transcript.append_points(points);
    transcript.finish()
}

/// Expand a seed digest into `count` challenge bits (counter-mode SHA-256).
pub fn expand_bits(seed: &Digest, count: usize) -> Vec<bool> {
    let mut bits = Vec::with_capacity(count);
    let mut block_index = 0u64;
    while bits.len() < count {
        let mut block = TranscriptHasher::new(b"expand");
        block.append_digest(seed).append_u64(block_index);
        let block = block.finish();
        for byte in block.as_bytes() {
            for shift in 0..8 {
                if bits.len() == count {
                    return bits;
                }
                bits.push((byte >> shift) & 1 == 1);
            }
        }
        block_index += 1;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffling::group::{generator, multiply, Scalar};

    #[test]
    fn domains_separate_identical_inputs() {
        let points = vec![generator()];
        assert_ne!(
            hash_points(DOMAIN_DECK, &points),
            hash_points(DOMAIN_SHUFFLE_COMMIT, &points)
        );
    }

    #[test]
    fn point_order_changes_digest() {
        let a = generator();
        let b = multiply(&Scalar::from(7u64), &a);
        assert_ne!(hash_points(DOMAIN_DECK, &[a, b]), hash_points(DOMAIN_DECK, &[b, a]));
    }

    #[test]
    fn expanded_bits_are_deterministic_and_sized() {
        let seed = hash_points(DOMAIN_DECK, &[generator()]);
        let bits = expand_bits(&seed, 300);
        assert_eq!(bits.len(), 300);
        assert_eq!(bits, expand_bits(&seed, 300));
        assert_eq!(&bits[..16], &expand_bits(&seed, 16)[..]);
        // 300 fair coin flips landing all on one side would mean a broken expander.
        assert!(bits.iter().any(|b| *b) && bits.iter().any(|b| !*b));
    }
}
