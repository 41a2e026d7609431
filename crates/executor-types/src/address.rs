// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! Contract address derivation (§6.5) and table naming (§6.4).

use sha3::{Digest, Keccak256};

/// A contract address: either a 20-byte EVM address (lowercase hex, no
/// `0x` prefix once stored) or an absolute Wasm path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContractAddress {
    Evm([u8; 20]),
    Wasm(String),
}

impl ContractAddress {
    /// The row-table name a contract's storage lives in (§3, §6.4):
    /// `/apps/<address>` (EVM, lowercased hex) or `/apps/<path>` (Wasm).
    pub fn table_name(&self) -> String {
        match self {
            ContractAddress::Evm(addr) => format!("/apps/{}", hex::encode(addr)),
            ContractAddress::Wasm(path) => format!("/apps/{}", path.trim_start_matches('/')),
        }
    }

    pub fn to_hex(&self) -> String {
        match self {
            ContractAddress::Evm(addr) => hex::encode(addr),
            ContractAddress::Wasm(path) => path.clone(),
        }
    }
}

/// EVM `create`: `keccak256(rlp(sender, nonce))` truncated to the low
/// 20 bytes (§6.5). RLP-encodes only the two fields needed here rather
/// than depending on a general RLP crate, since the executor core
/// never needs to RLP-encode anything else.
pub fn evm_create_address(sender: &[u8; 20], nonce: u64) -> [u8; 20] {
    let mut nonce_bytes = nonce.to_be_bytes().to_vec();
    while nonce_bytes.first() == Some(&0) && nonce_bytes.len() > 1 {
        nonce_bytes.remove(0);
    }
    if nonce == 0 {
        nonce_bytes = vec![0x80];
    } else {
        nonce_bytes = rlp_bytes(&nonce_bytes);
    }
    let sender_rlp = rlp_bytes(sender);
    let mut payload = Vec::with_capacity(sender_rlp.len() + nonce_bytes.len());
    payload.extend_from_slice(&sender_rlp);
    payload.extend_from_slice(&nonce_bytes);
    let list = rlp_list(&payload);
    let digest = Keccak256::digest(&list);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    out
}

/// EVM `create2`: `keccak256(0xff || sender || salt || keccak256(initcode))` (§6.5).
pub fn evm_create2_address(sender: &[u8; 20], salt: &[u8; 32], init_code: &[u8]) -> [u8; 20] {
    let code_hash = Keccak256::digest(init_code);
    let mut buf = Vec::with_capacity(1 + 20 + 32 + 32);
    buf.push(0xffu8);
    buf.extend_from_slice(sender);
    buf.extend_from_slice(salt);
    buf.extend_from_slice(&code_hash);
    let digest = Keccak256::digest(&buf);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    out
}

/// EIP-55 checksum encoding used purely for display purposes; storage
/// keys always use the lowercase form (§3 invariant).
pub fn eip55_checksum(addr: &[u8; 20]) -> String {
    let lower = hex::encode(addr);
    let hash = Keccak256::digest(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        if c.is_ascii_digit() {
            out.push(c);
            continue;
        }
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0xf;
        if nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parses a wire-format contract address (`CallParameters.receiver`,
/// `Transaction.to`) back into a [`ContractAddress`]: an absolute path
/// is Wasm, otherwise lowercase hex bytes are an EVM address (§6.4).
pub fn parse_contract_address(receiver: &str) -> ContractAddress {
    if receiver.starts_with('/') {
        return ContractAddress::Wasm(receiver.to_string());
    }
    let mut bytes = [0u8; 20];
    if let Ok(decoded) = hex::decode(receiver) {
        let n = decoded.len().min(20);
        bytes[..n].copy_from_slice(&decoded[..n]);
    }
    ContractAddress::Evm(bytes)
}

/// Validates a caller-supplied Wasm contract path (§4.D, §6.5): must
/// be absolute and must not already name an existing table.
pub fn validate_wasm_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err(format!("wasm contract path must be absolute: {path}"));
    }
    if path == "/apps" || path.starts_with("/apps/") {
        return Err(format!("wasm contract path collides with system namespace: {path}"));
    }
    Ok(())
}

fn rlp_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }
    let mut out = rlp_length_prefix(0x80, data.len());
    out.extend_from_slice(data);
    out
}

fn rlp_list(payload: &[u8]) -> Vec<u8> {
    let mut out = rlp_length_prefix(0xc0, payload.len());
    out.extend_from_slice(payload);
    out
}

fn rlp_length_prefix(base: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        vec![base + len as u8]
    } else {
        let len_bytes = len.to_be_bytes();
        let len_bytes: Vec<u8> = len_bytes
            .iter()
            .skip_while(|b| **b == 0)
            .copied()
            .collect();
        let mut out = vec![base + 55 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_lowercases_evm_address() {
        let addr = ContractAddress::Evm([0xABu8, 0xCD, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(addr.table_name(), "/apps/abcd000000000000000000000000000000000000");
    }

    #[test]
    fn create_and_create2_differ_and_are_deterministic() {
        let sender = [0x11u8; 20];
        let a1 = evm_create_address(&sender, 0);
        let a2 = evm_create_address(&sender, 1);
        assert_ne!(a1, a2);
        assert_eq!(a1, evm_create_address(&sender, 0));

        let salt = [0x22u8; 32];
        let c2 = evm_create2_address(&sender, &salt, b"initcode");
        assert_ne!(c2, a1);
        assert_eq!(c2, evm_create2_address(&sender, &salt, b"initcode"));
    }

    #[test]
    fn wasm_path_must_be_absolute_and_outside_apps() {
        assert!(validate_wasm_path("usr/alice/hello").is_err());
        assert!(validate_wasm_path("/apps/foo").is_err());
        assert!(validate_wasm_path("/usr/alice/hello_world").is_ok());
    }
}
