// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use crate::call::CreateKind;
use crate::log::LogEntry;
use crate::status::TransactionStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `ExecutionMessage.type` (§6.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    TxHash,
    Message,
    Finished,
    Revert,
    SendBack,
    WaitKey,
}

/// The wire message exchanged across the facade boundary (§6.1). This
/// is the external analogue of [`crate::CallParameters`]; the facade
/// translates between the two at the (contextID, seq) boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMessage {
    pub message_type: MessageType,
    pub context_id: u64,
    pub seq: u32,
    pub from: String,
    pub to: String,
    pub origin: String,
    pub transaction_hash: Option<[u8; 32]>,
    pub data: Vec<u8>,
    pub gas_available: u64,
    pub static_call: bool,
    pub create: bool,
    pub create_kind: Option<CreateKind>,
    pub create_salt: Option<[u8; 32]>,
    pub status: TransactionStatus,
    pub message: String,
    pub log_entries: Vec<LogEntry>,
    pub new_evm_contract_address: Option<String>,
    pub key_locks: BTreeSet<(String, String)>,
}

impl ExecutionMessage {
    pub fn txhash(context_id: u64, seq: u32, transaction_hash: [u8; 32]) -> Self {
        Self {
            message_type: MessageType::TxHash,
            context_id,
            seq,
            from: String::new(),
            to: String::new(),
            origin: String::new(),
            transaction_hash: Some(transaction_hash),
            data: Vec::new(),
            gas_available: 0,
            static_call: false,
            create: false,
            create_kind: None,
            create_salt: None,
            status: TransactionStatus::None,
            message: String::new(),
            log_entries: Vec::new(),
            new_evm_contract_address: None,
            key_locks: BTreeSet::new(),
        }
    }

    pub fn send_back(context_id: u64, seq: u32, reason: impl Into<String>) -> Self {
        Self {
            message: reason.into(),
            message_type: MessageType::SendBack,
            ..Self::txhash(context_id, seq, [0u8; 32])
        }
    }
}
