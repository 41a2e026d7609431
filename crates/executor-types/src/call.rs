// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use crate::log::{merge_bloom, LogEntry};
use crate::status::TransactionStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inbound/outbound message between call frames (§3 "CallParameters").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    Message,
    Finished,
    Revert,
    WaitKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateKind {
    Create,
    Create2,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallParameters {
    pub kind: CallKind,
    pub sender: String,
    pub receiver: String,
    pub code_address: String,
    pub origin: String,
    pub gas: u64,
    pub gas_used: u64,
    pub input: Vec<u8>,
    pub output: Vec<u8>,
    pub static_call: bool,
    pub create: bool,
    pub create_kind: Option<CreateKind>,
    pub create_salt: Option<[u8; 32]>,
    pub status: TransactionStatus,
    pub message: String,
    pub log_entries: Vec<LogEntry>,
    pub new_contract_address: Option<String>,
    pub key_locks: BTreeSet<(String, String)>,
}

impl CallParameters {
    /// Builds the inbound `message` kind describing an external call
    /// request emitted by a Host Context (§4.C `call`/`create`).
    pub fn message(sender: impl Into<String>, receiver: impl Into<String>, gas: u64) -> Self {
        let sender = sender.into();
        let receiver = receiver.into();
        Self {
            kind: CallKind::Message,
            origin: sender.clone(),
            code_address: receiver.clone(),
            sender,
            receiver,
            gas,
            gas_used: 0,
            input: Vec::new(),
            output: Vec::new(),
            static_call: false,
            create: false,
            create_kind: None,
            create_salt: None,
            status: TransactionStatus::None,
            message: String::new(),
            log_entries: Vec::new(),
            new_contract_address: None,
            key_locks: BTreeSet::new(),
        }
    }

    pub fn finished(mut self, output: Vec<u8>, gas_remaining: u64) -> Self {
        self.kind = CallKind::Finished;
        self.gas_used = self.gas.saturating_sub(gas_remaining);
        self.output = output;
        self.status = TransactionStatus::None;
        self
    }

    pub fn reverted(mut self, status: TransactionStatus, output: Vec<u8>, gas_remaining: u64) -> Self {
        self.kind = CallKind::Revert;
        self.gas_used = self.gas.saturating_sub(gas_remaining);
        self.output = output;
        self.status = status;
        self
    }

    /// Merges the callee's granted key-locks into this (caller) frame,
    /// per §4.D "External calls": "the scheduler ... eventually
    /// replying with a finished/revert CallParameters whose key-locks
    /// set is merged into the caller's."
    pub fn merge_key_locks(&mut self, callee: &CallParameters) {
        self.key_locks.extend(callee.key_locks.iter().cloned());
    }

    pub fn logs_bloom(&self) -> [u8; 256] {
        merge_bloom(self.log_entries.iter().map(LogEntry::bloom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_computes_gas_used() {
        let call = CallParameters::message("alice", "bob", 1000).finished(vec![1, 2, 3], 400);
        assert_eq!(call.gas_used, 600);
        assert_eq!(call.kind, CallKind::Finished);
    }

    #[test]
    fn merge_key_locks_unions_sets() {
        let mut caller = CallParameters::message("a", "b", 10);
        caller.key_locks.insert(("T".into(), "k1".into()));
        let mut callee = CallParameters::message("b", "c", 5);
        callee.key_locks.insert(("T".into(), "k2".into()));
        caller.merge_key_locks(&callee);
        assert_eq!(caller.key_locks.len(), 2);
    }
}
