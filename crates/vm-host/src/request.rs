// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use chain_executor_types::{CallParameters, Entry, Hash};

/// Every message a frame's fiber can push to the scheduler (§4.B
/// "Messages carried are one of..."): storage operations, the
/// key-lock wait/grant protocol, and external call/create requests.
/// All are suspension points except none — `HostContext` never talks
/// to the overlay directly, so this is the complete vocabulary between
/// a VM and the rest of the engine.
#[derive(Clone, Debug)]
pub enum HostRequest {
    GetRow { table: String, key: String },
    GetRows { table: String, keys: Vec<String> },
    GetPrimaryKeys { table: String },
    SetRow { table: String, key: String, entry: Entry },
    OpenTable { name: String },
    CreateTable { name: String, value_fields: String },
    /// Requests the lock on `(table, key)` before a conflicting write
    /// (§4.C `set`, §4.D "Key locks"). Answered with `Granted` or,
    /// if granting would create a wait-for cycle, `Revert`.
    WaitKey { table: String, key: String },
    BlockHash(u64),
    Call(CallParameters),
    Create(CallParameters),
}

#[derive(Clone, Debug)]
pub enum HostResponse {
    Row(Option<Entry>),
    Rows(Vec<Option<Entry>>),
    Keys(Vec<String>),
    TableOpened(bool),
    TableCreated(bool),
    Ack,
    Granted,
    Revert,
    Hash(Option<Hash>),
    Call(CallParameters),
}
