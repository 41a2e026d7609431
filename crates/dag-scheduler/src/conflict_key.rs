// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! Conflict-key computation (§4.G step 2d). Grounded directly on the
//! original `decodeConflictFields`: every field's key begins with an
//! 8-byte integer (`hash(to) + field.slot`), `All`/`Len` append
//! nothing further, `Env` appends the relevant register's bytes, and
//! `Var(path)` appends the byte range `scale_walk::locate` finds.
//! Matching the original, `Env(Caller)` and `Env(Origin)` both append
//! the transaction's sender — at the top level a DAG task has no
//! caller distinct from its sender.

use crate::scale_walk::locate;
use chain_executor_types::{ConflictKind, EnvKind, FunctionAbi};
use sha3::{Digest, Keccak256};

/// One computed conflict key: `bytes` is the exact key used for
/// `lastWriter`, `slot` is the coarser integer used for `lastSlot`
/// (§4.G step 3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictKey {
    pub bytes: Vec<u8>,
    pub slot: u64,
}

fn hash_to(to: &str) -> u64 {
    let digest = Keccak256::digest(to.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().unwrap())
}

/// Computes one conflict key per `abi.conflict_fields`, or `None` if a
/// `Var(path)` field cannot be located in `calldata` (malformed input
/// against the declared ABI — the caller marks the transaction
/// `SendBack`, §4.G step 2c/2d).
pub fn conflict_keys(
    abi: &FunctionAbi,
    to: &str,
    sender: &str,
    block_number: u64,
    block_timestamp: u64,
    calldata: &[u8],
) -> Option<Vec<ConflictKey>> {
    let base = hash_to(to);
    let mut out = Vec::with_capacity(abi.conflict_fields.len());
    for field in &abi.conflict_fields {
        let slot = base.wrapping_add(field.slot);
        let mut bytes = slot.to_be_bytes().to_vec();
        match &field.kind {
            ConflictKind::All | ConflictKind::Len => {},
            ConflictKind::Env(EnvKind::Caller) | ConflictKind::Env(EnvKind::Origin) => {
                bytes.extend_from_slice(sender.as_bytes());
            },
            ConflictKind::Env(EnvKind::Now) => {
                bytes.extend_from_slice(&block_timestamp.to_be_bytes());
            },
            ConflictKind::Env(EnvKind::BlockNumber) => {
                bytes.extend_from_slice(&block_number.to_be_bytes());
            },
            ConflictKind::Env(EnvKind::SelfAddress) => {
                bytes.extend_from_slice(to.as_bytes());
            },
            ConflictKind::Var(path) => {
                let (start, end) = locate(&abi.inputs, path, calldata)?;
                bytes.extend_from_slice(&calldata[start..end]);
            },
        }
        out.push(ConflictKey { bytes, slot });
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_executor_types::{AbiParam, AbiType, ConflictField};

    fn abi(fields: Vec<ConflictField>) -> FunctionAbi {
        FunctionAbi {
            name: "transfer".into(),
            selector: [1, 2, 3, 4],
            inputs: vec![
                AbiParam { name: "from".into(), ty: AbiType::U32 },
                AbiParam { name: "to".into(), ty: AbiType::U32 },
            ],
            conflict_fields: fields,
        }
    }

    #[test]
    fn all_field_key_is_exactly_eight_bytes() {
        let keys = conflict_keys(&abi(vec![ConflictField::all(1)]), "0xabc", "0xsender", 1, 2, &[]).unwrap();
        assert_eq!(keys[0].bytes.len(), 8);
    }

    #[test]
    fn var_field_appends_located_range() {
        let data = 99u32.to_le_bytes().to_vec();
        let keys = conflict_keys(&abi(vec![ConflictField::var(vec![0], 1, false)]), "0xabc", "0xsender", 1, 2, &data)
            .unwrap();
        assert_eq!(&keys[0].bytes[8..], &data[..]);
    }

    #[test]
    fn same_to_and_slot_produce_same_base_across_calls() {
        let a = conflict_keys(&abi(vec![ConflictField::all(5)]), "0xabc", "0xsender", 1, 2, &[]).unwrap();
        let b = conflict_keys(&abi(vec![ConflictField::all(5)]), "0xabc", "0xother", 9, 9, &[]).unwrap();
        assert_eq!(a[0].slot, b[0].slot);
    }

    #[test]
    fn var_field_with_bad_path_returns_none() {
        assert!(conflict_keys(&abi(vec![ConflictField::var(vec![9], 1, false)]), "0xabc", "0xsender", 1, 2, &[]).is_none());
    }
}
