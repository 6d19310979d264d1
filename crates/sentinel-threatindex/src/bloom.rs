//! Bloom filter membership oracle.
//!
//! Backed by a packed bit-array of `m` bits and `k` hash functions derived
//! by double-hashing a single SHA-256 digest, per Kirsch & Mitzenmacher
//! (2006), "Less Hashing, Same Performance: Building a Better Bloom
//! Filter". False positives are possible; false negatives are not.

use crate::error::{Result, ThreatIndexError};
use sha2::{Digest, Sha256};

/// Default bit-array size (~1.2 billion bits, ≈0.1% FPR at 100M items).
pub const DEFAULT_M: usize = 1_200_000_000;
/// Default number of hash functions.
pub const DEFAULT_K: usize = 10;

const HEADER_LEN: usize = 8 * 3;

/// A probabilistic set of content fingerprints.
pub struct BloomFilter {
    m: usize,
    k: usize,
    bits: Vec<u8>,
    bits_set: u64,
}

impl BloomFilter {
    /// Creates an empty filter with `m` bits and `k` hash functions.
    ///
    /// # Panics
    ///
    /// Panics if `m` or `k` is zero.
    #[must_use]
    pub fn new(m: usize, k: usize) -> Self {
        assert!(m > 0, "bloom filter m must be non-zero");
        assert!(k > 0, "bloom filter k must be non-zero");
        Self {
            m,
            k,
            bits: vec![0u8; m.div_ceil(8)],
            bits_set: 0,
        }
    }

    /// Creates a filter using the default `(m, k)` parameters.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_M, DEFAULT_K)
    }

    #[must_use]
    pub const fn m(&self) -> usize {
        self.m
    }

    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub const fn bits_set(&self) -> u64 {
        self.bits_set
    }

    /// Adds `item` to the set. Idempotent.
    pub fn add(&mut self, item: &[u8]) {
        for idx in self.indices(item) {
            self.set_bit(idx);
        }
    }

    /// Returns `true` if `item` may be a member (false positives possible).
    /// Returns `false` only when `item` is definitely not a member.
    #[must_use]
    pub fn contains(&self, item: &[u8]) -> bool {
        self.indices(item).all(|idx| self.get_bit(idx))
    }

    /// Estimated number of distinct items added, via
    /// `-(m/k)*ln(1 - bits_set/m)`.
    #[must_use]
    pub fn estimated_count(&self) -> f64 {
        if self.bits_set == 0 {
            return 0.0;
        }
        let m = self.m as f64;
        let k = self.k as f64;
        let fraction = self.bits_set as f64 / m;
        if fraction >= 1.0 {
            return f64::INFINITY;
        }
        -(m / k) * (1.0 - fraction).ln()
    }

    /// Merges `other` into `self` via bitwise OR.
    ///
    /// # Errors
    ///
    /// Fails if `other` has different `(m, k)` parameters.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.m != other.m || self.k != other.k {
            return Err(ThreatIndexError::ParameterMismatch {
                expected_m: self.m,
                expected_k: self.k,
                actual_m: other.m,
                actual_k: other.k,
            });
        }
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= *b;
        }
        self.bits_set = self.bits.iter().map(|b| b.count_ones() as u64).sum();
        Ok(())
    }

    /// Serializes as a fixed `(m, k, bits_set)` header followed by the raw
    /// bit-array bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.bits.len());
        out.extend_from_slice(&(self.m as u64).to_le_bytes());
        out.extend_from_slice(&(self.k as u64).to_le_bytes());
        out.extend_from_slice(&self.bits_set.to_le_bytes());
        out.extend_from_slice(&self.bits);
        out
    }

    /// Deserializes a filter produced by [`BloomFilter::serialize`].
    ///
    /// # Errors
    ///
    /// Fails if `data` is shorter than the header, or the header declares
    /// a bit-array length that doesn't match the remaining bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(ThreatIndexError::Corrupt(
                "truncated bloom filter header".into(),
            ));
        }
        let m = u64::from_le_bytes(data[0..8].try_into().unwrap()) as usize;
        let k = u64::from_le_bytes(data[8..16].try_into().unwrap()) as usize;
        let bits_set = u64::from_le_bytes(data[16..24].try_into().unwrap());
        let bits = &data[HEADER_LEN..];
        let expected_len = m.div_ceil(8);
        if bits.len() != expected_len {
            return Err(ThreatIndexError::Corrupt(format!(
                "bit-array length {} does not match declared m={} ({} bytes expected)",
                bits.len(),
                m,
                expected_len
            )));
        }
        Ok(Self {
            m,
            k,
            bits: bits.to_vec(),
            bits_set,
        })
    }

    fn indices(&self, item: &[u8]) -> impl Iterator<Item = usize> + '_ {
        let digest = Sha256::digest(item);
        let h1 = u64::from_le_bytes(digest[0..8].try_into().unwrap());
        let h2 = u64::from_le_bytes(digest[8..16].try_into().unwrap());
        let m = self.m as u64;
        (0..self.k as u64).map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % m) as usize)
    }

    fn set_bit(&mut self, idx: usize) {
        let byte = idx / 8;
        let mask = 1u8 << (idx % 8);
        if self.bits[byte] & mask == 0 {
            self.bits[byte] |= mask;
            self.bits_set += 1;
        }
    }

    fn get_bit(&self, idx: usize) -> bool {
        let byte = idx / 8;
        let mask = 1u8 << (idx % 8);
        self.bits[byte] & mask != 0
    }
}
