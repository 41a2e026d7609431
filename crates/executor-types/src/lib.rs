// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! Data model shared by every crate in the executor core: tables and
//! entries (§3), call parameters exchanged between frames, the ABI
//! conflict-field descriptors consumed by the DAG scheduler, and the
//! transaction status taxonomy (§7).

pub mod address;
pub mod call;
pub mod conflict;
pub mod error;
pub mod keylock;
pub mod log;
pub mod message;
pub mod pool;
pub mod status;
pub mod table;

pub use address::{parse_contract_address, ContractAddress};
pub use call::{CallKind, CallParameters, CreateKind};
pub use conflict::{AbiParam, AbiType, ConflictField, ConflictKind, EnvKind, FunctionAbi};
pub use error::StoreError;
pub use keylock::{DeadLock, KeyLockRegistry};
pub use log::LogEntry;
pub use message::{ExecutionMessage, MessageType};
pub use pool::{PoolError, Transaction, TransactionPool};
pub use status::{MappedStatus, TransactionStatus, VmStatus};
pub use table::{Entry, EntryStatus, Table};

/// Hash type used throughout the core: a 32-byte digest (block hash,
/// code hash, overlay hash, contract address keccak input/output).
pub type Hash = [u8; 32];

/// Schedule version gates VM behavior (gas costs, opcode set) the way
/// `schedule` does in the Host Context contract (§4.C).
pub type ScheduleVersion = u32;
