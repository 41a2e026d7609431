// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The transaction pool interface the core consumes (§6.2): `fillBlock(hashes) ->
//! Transaction[]`, invoked exactly once per DAG batch and once per `txhash`
//! message. Encoding of pooled transactions is opaque to the pool itself;
//! this module only fixes the shape the executor core needs out of one.

use crate::call::CreateKind;
use crate::Hash;
use thiserror::Error;

/// The fields the core needs out of a pooled transaction to build a
/// call frame (§4.D, §4.G step 1 "Materialize").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash,
    pub sender: String,
    pub to: String,
    pub origin: String,
    pub input: Vec<u8>,
    pub gas: u64,
    pub static_call: bool,
    pub create: bool,
    pub create_kind: Option<CreateKind>,
    pub create_salt: Option<[u8; 32]>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("pool error: {0}")]
    Backend(String),
}

pub trait TransactionPool: Send + Sync {
    /// `fillBlock(hashes[]) -> error? | Transaction[]` (§6.2). Implementations
    /// may return a partial `Vec` shorter than `hashes` only via `Err`; a
    /// successful call must return exactly one transaction per hash, in the
    /// same order.
    fn fill_block(&self, hashes: &[Hash]) -> Result<Vec<Transaction>, PoolError>;
}
