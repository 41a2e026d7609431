// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The Host Context (§4.C): the narrow interface a VM calls while
//! executing one frame's bytecode. Every storage, code-lookup, and
//! external-call operation is a suspension point carried over the
//! frame's [`chain_fiber::FiberContext`] — the scheduler on the other
//! end (component D, the Transaction Executive) resolves each request
//! against the block's overlay, key-lock table, and sibling
//! executives, and resumes the fiber with the answer.

mod request;

pub use request::{HostRequest, HostResponse};

use chain_executor_types::{CallParameters, ContractAddress, CreateKind, DeadLock, Entry, Hash, ScheduleVersion};
use chain_fiber::FiberContext;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;

/// The value-field name contract storage rows use (§6.4: a contract
/// table's ordinary rows carry a single opaque `value` column; `code`,
/// `codeHash`, and `codeAbi` are reserved row keys in the same table).
pub const VALUE_FIELD: &str = "value";
pub const CODE_ROW: &str = "code";
pub const CODE_HASH_ROW: &str = "codeHash";
pub const CODE_ABI_ROW: &str = "codeAbi";

/// Everything about the enclosing frame the VM needs to read without
/// suspending: sender/origin/call-kind/gas metadata (§4.C accessors).
#[derive(Clone, Debug)]
pub struct FrameInfo {
    pub my_address: ContractAddress,
    pub caller: String,
    pub origin: String,
    pub input_data: Vec<u8>,
    pub is_create: bool,
    pub is_static_call: bool,
    pub depth: u32,
    pub gas_left: u64,
    pub schedule: ScheduleVersion,
}

/// The Host Context handed to a VM for the duration of one frame.
/// Wraps the frame's fiber context; every method that touches shared
/// state suspends and waits for the scheduler's response.
pub struct HostContext<'a> {
    fiber: &'a FiberContext<HostRequest, HostResponse>,
    info: FrameInfo,
    /// Per-key observed version, recorded by `get` (§4.C "remembers the
    /// observed version per key"). Exposed for callers that want to
    /// avoid a redundant read before a blind write; the scheduler still
    /// computes the authoritative next version from the overlay itself,
    /// so a stale or missing entry here never breaks monotonicity.
    observed_versions: HashMap<String, u64>,
    /// This frame's own log sub-state (§4.C `log`, §7 "Sub-state and
    /// logs"): populated by `log`, merged up from a successful child
    /// call by `merge_logs`, and taken by the executive when the frame
    /// finalizes — discarded entirely on revert.
    logs: Vec<chain_executor_types::LogEntry>,
    /// This frame's own suicide sub-state, same lifecycle as `logs`.
    suicides: Vec<(String, String)>,
}

impl<'a> HostContext<'a> {
    pub fn new(fiber: &'a FiberContext<HostRequest, HostResponse>, info: FrameInfo) -> Self {
        Self {
            fiber,
            info,
            observed_versions: HashMap::new(),
            logs: Vec::new(),
            suicides: Vec::new(),
        }
    }

    fn table(&self) -> String {
        self.info.my_address.table_name()
    }

    /// `get(key) -> bytes`.
    pub fn get(&mut self, key: &str) -> Vec<u8> {
        let resp = self.fiber.suspend(HostRequest::GetRow {
            table: self.table(),
            key: key.to_string(),
        });
        match resp {
            HostResponse::Row(Some(entry)) => {
                self.observed_versions.insert(key.to_string(), entry.version);
                entry
                    .get_field(&[VALUE_FIELD], VALUE_FIELD)
                    .map(|v| v.as_bytes().to_vec())
                    .unwrap_or_default()
            },
            _ => Vec::new(),
        }
    }

    /// `set(key, value)`: requests the key-lock first (§4.C, §4.D "Key
    /// locks") so a conflicting concurrent frame either waits or this
    /// frame is resumed with a deadlock revert.
    pub fn set(&mut self, key: &str, value: &[u8]) -> Result<(), DeadLock> {
        self.write_locked_row(&self.table(), key, String::from_utf8_lossy(value).into_owned())
    }

    /// Persists freshly deployed bytecode into the reserved `code` and
    /// `codeHash` rows of the frame's own table (§4.D step 5). Takes
    /// the same key-lock path as an ordinary `set` — code rows are
    /// ordinary rows in the contract's table, just at reserved keys.
    pub fn set_code(&mut self, code: &[u8]) -> Result<(), DeadLock> {
        let table = self.table();
        self.write_locked_row(&table, CODE_ROW, hex::encode(code))?;
        let digest = Keccak256::digest(code);
        self.write_locked_row(&table, CODE_HASH_ROW, hex::encode(digest))
    }

    /// Persists a Wasm contract's decoded ABI alongside its code
    /// (§4.D step 5, "Wasm only").
    pub fn set_code_abi(&mut self, abi_bytes: &[u8]) -> Result<(), DeadLock> {
        let table = self.table();
        self.write_locked_row(&table, CODE_ABI_ROW, hex::encode(abi_bytes))
    }

    fn write_locked_row(&self, table: &str, key: &str, value: String) -> Result<(), DeadLock> {
        match self.fiber.suspend(HostRequest::WaitKey {
            table: table.to_string(),
            key: key.to_string(),
        }) {
            HostResponse::Granted => {},
            HostResponse::Revert => return Err(DeadLock),
            other => unreachable!("WaitKey must answer Granted or Revert, got {other:?}"),
        }
        let entry = Entry {
            fields: vec![value],
            version: 0,
            status: chain_executor_types::EntryStatus::Normal,
        };
        let resp = self.fiber.suspend(HostRequest::SetRow {
            table: table.to_string(),
            key: key.to_string(),
            entry,
        });
        match resp {
            HostResponse::Ack => Ok(()),
            _ => unreachable!("SetRow must answer Ack"),
        }
    }

    pub fn code(&self) -> Vec<u8> {
        self.code_at(&self.info.my_address)
    }

    pub fn code_hash(&self) -> Hash {
        self.code_hash_at(&self.info.my_address)
    }

    pub fn code_size_at(&self, addr: &ContractAddress) -> usize {
        self.code_at(addr).len()
    }

    pub fn code_hash_at(&self, addr: &ContractAddress) -> Hash {
        let resp = self.fiber.suspend(HostRequest::GetRow {
            table: addr.table_name(),
            key: CODE_HASH_ROW.to_string(),
        });
        match resp {
            HostResponse::Row(Some(entry)) => {
                let mut out = [0u8; 32];
                if let Some(hex_str) = entry.fields.first() {
                    if let Ok(bytes) = hex::decode(hex_str) {
                        let n = bytes.len().min(32);
                        out[..n].copy_from_slice(&bytes[..n]);
                    }
                }
                out
            },
            _ => [0u8; 32],
        }
    }

    pub fn code_at(&self, addr: &ContractAddress) -> Vec<u8> {
        let resp = self.fiber.suspend(HostRequest::GetRow {
            table: addr.table_name(),
            key: CODE_ROW.to_string(),
        });
        match resp {
            HostResponse::Row(Some(entry)) => entry
                .fields
                .first()
                .and_then(|hex_str| hex::decode(hex_str).ok())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn block_hash(&self, number: u64) -> Option<Hash> {
        match self.fiber.suspend(HostRequest::BlockHash(number)) {
            HostResponse::Hash(h) => h,
            _ => None,
        }
    }

    /// `log(topics, data)`: purely local sub-state bookkeeping, not a
    /// suspension point — the frame's log buffer is finalized (and,
    /// on revert, discarded) by the executive at frame end.
    pub fn log(&mut self, topics: Vec<Hash>, data: Vec<u8>) {
        self.logs.push(chain_executor_types::LogEntry {
            address: self.info.my_address.to_hex(),
            topics,
            data,
        });
    }

    /// Bubbles a completed child call's logs into this frame's buffer
    /// (§4.D step 4: a successful nested call's logs are retained).
    pub fn merge_logs(&mut self, logs: Vec<chain_executor_types::LogEntry>) {
        self.logs.extend(logs);
    }

    /// Drains this frame's accumulated logs; called once, at frame
    /// finalization, by the executive.
    pub fn take_logs(&mut self) -> Vec<chain_executor_types::LogEntry> {
        std::mem::take(&mut self.logs)
    }

    /// `call(params) -> Result`: suspends the frame, emitting an
    /// external-call request; resumes with the VM-friendly result.
    pub fn call(&self, receiver: &str, input: Vec<u8>, gas: u64, value_static: bool) -> CallParameters {
        let mut params = CallParameters::message(self.info.my_address.to_hex(), receiver, gas);
        params.origin = self.info.origin.clone();
        params.input = input;
        params.static_call = value_static || self.info.is_static_call;
        match self.fiber.suspend(HostRequest::Call(params)) {
            HostResponse::Call(result) => result,
            other => unreachable!("Call must answer with a CallParameters, got {other:?}"),
        }
    }

    /// `create(code, kind, salt?) -> Result`.
    pub fn create(&self, code: Vec<u8>, kind: CreateKind, salt: Option<[u8; 32]>, gas: u64) -> CallParameters {
        let mut params = CallParameters::message(self.info.my_address.to_hex(), "", gas);
        params.origin = self.info.origin.clone();
        params.input = code;
        params.create = true;
        params.create_kind = Some(kind);
        params.create_salt = salt;
        match self.fiber.suspend(HostRequest::Create(params)) {
            HostResponse::Call(result) => result,
            other => unreachable!("Create must answer with a CallParameters, got {other:?}"),
        }
    }

    /// `suicide(beneficiary)`: records into this frame's suicide set;
    /// consumed at finalize-frame time (§4.C).
    pub fn suicide(&mut self, beneficiary: String) {
        self.suicides.push((self.info.my_address.to_hex(), beneficiary));
    }

    /// Drains this frame's accumulated suicides; called once, at frame
    /// finalization, by the executive.
    pub fn take_suicides(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.suicides)
    }

    pub fn my_address(&self) -> &ContractAddress {
        &self.info.my_address
    }

    pub fn caller(&self) -> &str {
        &self.info.caller
    }

    pub fn origin(&self) -> &str {
        &self.info.origin
    }

    pub fn input_data(&self) -> &[u8] {
        &self.info.input_data
    }

    pub fn is_create(&self) -> bool {
        self.info.is_create
    }

    pub fn is_static_call(&self) -> bool {
        self.info.is_static_call
    }

    pub fn depth(&self) -> u32 {
        self.info.depth
    }

    pub fn gas_left(&self) -> u64 {
        self.info.gas_left
    }

    pub fn schedule(&self) -> ScheduleVersion {
        self.info.schedule
    }
}
