// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// A single emitted log (§3 "Log entry"): the emitting contract,
/// indexed topics, and opaque data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
}

impl LogEntry {
    pub fn new(address: impl Into<String>, topics: Vec<[u8; 32]>, data: Vec<u8>) -> Self {
        Self {
            address: address.into(),
            topics,
            data,
        }
    }

    /// A 256-bit Bloom filter over `address` and every topic, folded
    /// into the receipt the way the original `TransactionReceipt`
    /// (`Common.h`) does for light-client filtering. Three bits are
    /// set per item using the low 11 bits of three slices of its
    /// keccak digest, the standard Ethereum log-bloom construction.
    pub fn bloom(&self) -> [u8; 256] {
        let mut bloom = [0u8; 256];
        set_bloom_bits(&mut bloom, self.address.as_bytes());
        for t in &self.topics {
            set_bloom_bits(&mut bloom, t);
        }
        bloom
    }
}

fn set_bloom_bits(bloom: &mut [u8; 256], item: &[u8]) {
    let digest = Keccak256::digest(item);
    for chunk in digest.chunks(2).take(3) {
        let word = u16::from_be_bytes([chunk[0], chunk[1]]) & 0x07ff;
        let byte = 255 - (word >> 3) as usize;
        let bit = (word & 0x7) as u8;
        bloom[byte] |= 1 << bit;
    }
}

pub fn merge_bloom(blooms: impl IntoIterator<Item = [u8; 256]>) -> [u8; 256] {
    let mut acc = [0u8; 256];
    for b in blooms {
        for i in 0..256 {
            acc[i] |= b[i];
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_is_deterministic_and_nonzero() {
        let log = LogEntry::new("0xabc", vec![[1u8; 32]], b"data".to_vec());
        let b1 = log.bloom();
        let b2 = log.bloom();
        assert_eq!(b1, b2);
        assert!(b1.iter().any(|b| *b != 0));
    }
}
