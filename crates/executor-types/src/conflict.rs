// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Which live register an `Env` conflict field dereferences into
/// (§3 "ConflictField").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum EnvKind {
    Caller,
    Origin,
    Now,
    BlockNumber,
    SelfAddress,
}

/// The kind of a static conflict descriptor attached to an ABI method
/// (§3 "ConflictField").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum ConflictKind {
    All,
    Len,
    Env(EnvKind),
    Var(Vec<u32>),
}

/// `(kind, accessPath, slot, readOnly)` from §3. `access_path` records
/// the same path carried by `Var` for diagnostics even when `kind`
/// is not `Var`; `slot` is the salted integer fingerprinting the
/// conflict domain (§4.G step 2d).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ConflictField {
    pub kind: ConflictKind,
    pub access_path: Vec<u32>,
    pub slot: u64,
    pub read_only: bool,
}

impl ConflictField {
    pub fn all(slot: u64) -> Self {
        Self {
            kind: ConflictKind::All,
            access_path: Vec::new(),
            slot,
            read_only: false,
        }
    }

    pub fn len(slot: u64) -> Self {
        Self {
            kind: ConflictKind::Len,
            access_path: Vec::new(),
            slot,
            read_only: false,
        }
    }

    pub fn env(kind: EnvKind, slot: u64) -> Self {
        Self {
            kind: ConflictKind::Env(kind),
            access_path: Vec::new(),
            slot,
            read_only: false,
        }
    }

    pub fn var(path: Vec<u32>, slot: u64, read_only: bool) -> Self {
        Self {
            kind: ConflictKind::Var(path.clone()),
            access_path: path,
            slot,
            read_only,
        }
    }
}

/// A typed tree describing how one ABI input parameter is
/// SCALE-encoded, so a `Var(path)` conflict field can walk into it and
/// locate the byte range of the selected component (§3 "FunctionAbi",
/// §4.G step 2d).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum AbiType {
    U8,
    U32,
    U64,
    U128,
    Bool,
    Address,
    Bytes,
    String,
    Tuple(Vec<AbiType>),
    Vec(Box<AbiType>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct AbiParam {
    pub name: String,
    pub ty: AbiType,
}

/// Decoded contract method metadata (§3 "FunctionAbi"): the input
/// parameter descriptors plus the conflict-field list the DAG
/// scheduler uses to build its dependency graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct FunctionAbi {
    pub name: String,
    pub selector: [u8; 4],
    pub inputs: Vec<AbiParam>,
    pub conflict_fields: Vec<ConflictField>,
}

impl FunctionAbi {
    pub fn is_parallel(&self) -> bool {
        !self.conflict_fields.is_empty()
            && !self
                .conflict_fields
                .iter()
                .any(|f| matches!(f.kind, ConflictKind::All))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_parallel_false_when_all_conflict_present() {
        let abi = FunctionAbi {
            name: "transfer".into(),
            selector: [1, 2, 3, 4],
            inputs: vec![],
            conflict_fields: vec![ConflictField::all(0)],
        };
        assert!(!abi.is_parallel());
    }

    #[test]
    fn is_parallel_true_for_disjoint_var_fields() {
        let abi = FunctionAbi {
            name: "transfer".into(),
            selector: [1, 2, 3, 4],
            inputs: vec![],
            conflict_fields: vec![
                ConflictField::var(vec![0], 1, false),
                ConflictField::var(vec![1], 2, false),
            ],
        };
        assert!(abi.is_parallel());
    }
}
