// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The fixed set of EVM numeric precompiled (§4.F): ecrecover,
//! sha256, ripemd160, identity, modexp, the bn128 curve operations,
//! and blake2 — addresses `1` through `9`, left-padded hex.

use crate::PrecompiledResult;
use chain_executor_types::TransactionStatus;
use sha2::Digest as Sha2Digest;
use sha3::{Digest as Sha3Digest, Keccak256};
use bn::Group;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ethereum {
    EcRecover,
    Sha256,
    Ripemd160,
    Identity,
    Modexp,
    Bn128Add,
    Bn128Mul,
    Bn128Pairing,
    Blake2,
}

impl Ethereum {
    /// The reserved address (`1..=9`) this variant is bound to (§4.F
    /// "Addresses ≤ 9 (left-padded hex) are Ethereum-compatible").
    pub fn address(self) -> [u8; 20] {
        let mut addr = [0u8; 20];
        addr[19] = match self {
            Ethereum::EcRecover => 1,
            Ethereum::Sha256 => 2,
            Ethereum::Ripemd160 => 3,
            Ethereum::Identity => 4,
            Ethereum::Modexp => 5,
            Ethereum::Bn128Add => 6,
            Ethereum::Bn128Mul => 7,
            Ethereum::Bn128Pairing => 8,
            Ethereum::Blake2 => 9,
        };
        addr
    }

    pub fn call(self, input: &[u8]) -> PrecompiledResult {
        match self {
            Ethereum::EcRecover => ec_recover(input),
            Ethereum::Sha256 => sha256(input),
            Ethereum::Ripemd160 => ripemd160(input),
            Ethereum::Identity => identity(input),
            Ethereum::Modexp => modexp(input),
            Ethereum::Bn128Add => bn128_add(input),
            Ethereum::Bn128Mul => bn128_mul(input),
            Ethereum::Bn128Pairing => bn128_pairing(input),
            Ethereum::Blake2 => blake2_hash(input),
        }
    }
}

fn word(input: &[u8], i: usize) -> [u8; 32] {
    let mut out = [0u8; 32];
    let start = i * 32;
    if start < input.len() {
        let end = (start + 32).min(input.len());
        out[..end - start].copy_from_slice(&input[start..end]);
    }
    out
}

fn ec_recover(input: &[u8]) -> PrecompiledResult {
    const GAS: u64 = 3_000;
    let hash = word(input, 0);
    let v = word(input, 1);
    let r = word(input, 2);
    let s = word(input, 3);

    if v[..31].iter().any(|b| *b != 0) || !(v[31] == 27 || v[31] == 28) {
        return PrecompiledResult::error(GAS, TransactionStatus::CallAddressError);
    }
    let recovery_id = match libsecp256k1::RecoveryId::parse(v[31] - 27) {
        Ok(id) => id,
        Err(_) => return PrecompiledResult::error(GAS, TransactionStatus::CallAddressError),
    };
    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&r);
    sig_bytes[32..].copy_from_slice(&s);
    let signature = match libsecp256k1::Signature::parse_standard(&sig_bytes) {
        Ok(sig) => sig,
        Err(_) => return PrecompiledResult::error(GAS, TransactionStatus::CallAddressError),
    };
    let message = match libsecp256k1::Message::parse_slice(&hash) {
        Ok(m) => m,
        Err(_) => return PrecompiledResult::error(GAS, TransactionStatus::CallAddressError),
    };
    let public_key = match libsecp256k1::recover(&message, &signature, &recovery_id) {
        Ok(pk) => pk,
        Err(_) => return PrecompiledResult::error(GAS, TransactionStatus::CallAddressError),
    };
    // address = low 20 bytes of keccak256(uncompressed pubkey[1..])
    let uncompressed = public_key.serialize();
    let digest = Keccak256::digest(&uncompressed[1..]);
    let mut output = vec![0u8; 32];
    output[12..].copy_from_slice(&digest[12..]);
    PrecompiledResult::ok(GAS, output)
}

fn data_word_cost(len: usize, per_word: u64, base: u64) -> u64 {
    base + per_word * len.div_ceil(32) as u64
}

fn sha256(input: &[u8]) -> PrecompiledResult {
    let gas = data_word_cost(input.len(), 12, 60);
    let digest = sha2::Sha256::digest(input);
    PrecompiledResult::ok(gas, digest.to_vec())
}

fn ripemd160(input: &[u8]) -> PrecompiledResult {
    let gas = data_word_cost(input.len(), 120, 600);
    let digest = ripemd::Ripemd160::digest(input);
    let mut output = vec![0u8; 32];
    output[12..].copy_from_slice(&digest);
    PrecompiledResult::ok(gas, output)
}

fn identity(input: &[u8]) -> PrecompiledResult {
    let gas = data_word_cost(input.len(), 3, 15);
    PrecompiledResult::ok(gas, input.to_vec())
}

fn modexp(input: &[u8]) -> PrecompiledResult {
    let base_len = u256_to_usize(&word(input, 0));
    let exp_len = u256_to_usize(&word(input, 1));
    let mod_len = u256_to_usize(&word(input, 2));
    let header = 96;
    let base = read_padded(input, header, base_len);
    let exponent = read_padded(input, header + base_len, exp_len);
    let modulus = read_padded(input, header + base_len + exp_len, mod_len);

    // Simplified linear gas model (the precise EIP-2565 cost formula
    // is out of scope); proportional to the max operand length and
    // exponent size, floor matching the historical minimum of 200.
    let max_len = base_len.max(mod_len) as u64;
    let gas = (200 + max_len * max_len / 20 + exp_len as u64 * 8).max(200);

    if modulus.iter().all(|b| *b == 0) {
        return PrecompiledResult::ok(gas, vec![0u8; mod_len]);
    }
    let output = aurora_engine_modexp::modexp(&base, &exponent, &modulus);
    let mut padded = vec![0u8; mod_len];
    let start = mod_len.saturating_sub(output.len());
    padded[start..].copy_from_slice(&output[output.len().saturating_sub(mod_len)..]);
    PrecompiledResult::ok(gas, padded)
}

fn u256_to_usize(word: &[u8; 32]) -> usize {
    let mut out: u64 = 0;
    for b in &word[24..] {
        out = (out << 8) | *b as u64;
    }
    out as usize
}

fn read_padded(input: &[u8], start: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if start < input.len() {
        let end = (start + len).min(input.len());
        out[..end - start].copy_from_slice(&input[start..end]);
    }
    out
}

fn read_g1(input: &[u8], offset: usize) -> Result<bn::G1, ()> {
    let x = bn::Fq::from_slice(&word(input, offset / 32)).map_err(|_| ())?;
    let y = bn::Fq::from_slice(&word(input, offset / 32 + 1)).map_err(|_| ())?;
    if x.is_zero() && y.is_zero() {
        return Ok(bn::G1::zero());
    }
    bn::AffineG1::new(x, y).map(Into::into).map_err(|_| ())
}

fn read_fr(input: &[u8], offset: usize) -> Result<bn::Fr, ()> {
    bn::Fr::from_slice(&word(input, offset / 32)).map_err(|_| ())
}

fn write_g1(point: bn::G1) -> Vec<u8> {
    let mut output = vec![0u8; 64];
    if let Some(affine) = bn::AffineG1::from_jacobian(point) {
        affine.x().to_big_endian(&mut output[0..32]).ok();
        affine.y().to_big_endian(&mut output[32..64]).ok();
    }
    output
}

fn bn128_add(input: &[u8]) -> PrecompiledResult {
    const GAS: u64 = 150;
    let (a, b) = match (read_g1(input, 0), read_g1(input, 64)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    };
    PrecompiledResult::ok(GAS, write_g1(a + b))
}

fn bn128_mul(input: &[u8]) -> PrecompiledResult {
    const GAS: u64 = 6_000;
    let (point, scalar) = match (read_g1(input, 0), read_fr(input, 64)) {
        (Ok(p), Ok(s)) => (p, s),
        _ => return PrecompiledResult::error(GAS, TransactionStatus::PrecompiledError),
    };
    PrecompiledResult::ok(GAS, write_g1(point * scalar))
}

fn bn128_pairing(input: &[u8]) -> PrecompiledResult {
    const BASE_GAS: u64 = 45_000;
    const PER_PAIR_GAS: u64 = 34_000;
    if input.len() % 192 != 0 {
        return PrecompiledResult::error(BASE_GAS, TransactionStatus::PrecompiledError);
    }
    let pairs = input.len() / 192;
    let gas = BASE_GAS + PER_PAIR_GAS * pairs as u64;
    let mut elements = Vec::with_capacity(pairs);
    for i in 0..pairs {
        let base = i * 192;
        let g1 = match read_g1(input, base) {
            Ok(p) => p,
            Err(_) => return PrecompiledResult::error(gas, TransactionStatus::PrecompiledError),
        };
        let ax = match bn::Fq2::new(
            must_fq(input, base + 96),
            must_fq(input, base + 64),
        ) {
            fq2 => fq2,
        };
        let ay = bn::Fq2::new(must_fq(input, base + 160), must_fq(input, base + 128));
        let g2 = if ax.is_zero() && ay.is_zero() {
            bn::G2::zero()
        } else {
            match bn::AffineG2::new(ax, ay) {
                Ok(g2) => g2.into(),
                Err(_) => return PrecompiledResult::error(gas, TransactionStatus::PrecompiledError),
            }
        };
        elements.push((g1, g2));
    }
    let result = bn::pairing_batch(&elements);
    let success = result == bn::Gt::one();
    let mut output = vec![0u8; 32];
    if success {
        output[31] = 1;
    }
    PrecompiledResult::ok(gas, output)
}

fn must_fq(input: &[u8], offset: usize) -> bn::Fq {
    bn::Fq::from_slice(&word(input, offset / 32)).unwrap_or_else(|_| bn::Fq::zero())
}

fn blake2_hash(input: &[u8]) -> PrecompiledResult {
    use blake2::Digest as Blake2Digest;
    let gas = data_word_cost(input.len(), 3, 0);
    let digest = blake2::Blake2b512::digest(input);
    PrecompiledResult::ok(gas, digest.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_returns_input_with_linear_gas() {
        let result = identity(b"hello world");
        assert_eq!(result.output, b"hello world");
        assert_eq!(result.gas_used, 15 + 3);
    }

    #[test]
    fn sha256_matches_digest() {
        let result = sha256(b"abc");
        let expected = sha2::Sha256::digest(b"abc");
        assert_eq!(result.output, expected.to_vec());
    }

    #[test]
    fn bn128_add_identity_is_noop() {
        let mut input = vec![0u8; 128];
        // (1, 2) is the generator point of alt_bn128.
        input[31] = 1;
        input[63] = 2;
        let result = bn128_add(&input);
        assert_eq!(result.status, TransactionStatus::None);
        assert_eq!(&result.output[0..32], &input[0..32]);
        assert_eq!(&result.output[32..64], &input[32..64]);
    }

    #[test]
    fn modexp_of_zero_modulus_is_zero_length_result() {
        let mut input = vec![0u8; 96];
        input[31] = 1; // base_len = 1
        input[63] = 1; // exp_len = 1
        input[95] = 1; // mod_len = 1
        input.push(5); // base
        input.push(3); // exp
        input.push(0); // modulus = 0
        let result = modexp(&input);
        assert_eq!(result.output, vec![0u8]);
    }
}
