// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! Translation between the wire-level [`ExecutionMessage`] (§6.1) and
//! the internal [`CallParameters`] the executive speaks (§4.D).

use chain_executor_types::{CallKind, CallParameters, ExecutionMessage, MessageType, Transaction};

/// Builds the internal call params for an inbound `message`-kind
/// `ExecutionMessage` (§6.1): the request already carries every field
/// an executive needs, unlike a `txhash` request which must first be
/// materialized through the transaction pool.
pub fn call_parameters_from_message(msg: &ExecutionMessage) -> CallParameters {
    let mut params = CallParameters::message(msg.from.clone(), msg.to.clone(), msg.gas_available);
    params.origin = if msg.origin.is_empty() { msg.from.clone() } else { msg.origin.clone() };
    params.input = msg.data.clone();
    params.static_call = msg.static_call;
    params.create = msg.create;
    params.create_kind = msg.create_kind;
    params.create_salt = msg.create_salt;
    params
}

/// Builds the internal call params for a materialized pool
/// transaction (§6.2), the same shape `chain-dag-scheduler` builds for
/// its own batch tasks.
pub fn call_parameters_from_transaction(tx: &Transaction) -> CallParameters {
    let mut params = CallParameters::message(tx.sender.clone(), tx.to.clone(), tx.gas);
    params.origin = tx.origin.clone();
    params.input = tx.input.clone();
    params.static_call = tx.static_call;
    params.create = tx.create;
    params.create_kind = tx.create_kind;
    params.create_salt = tx.create_salt;
    params
}

/// Converts an executive's terminal result back into the wire message
/// the facade returns from `executeTransaction`/`call`/
/// `dagExecuteTransactions` (§6.1). `Executive::execute` always
/// returns a frame already resolved to `finished` or `revert` — the
/// recursive dispatch this workspace chose for §4.B's suspension
/// primitive (§9 Design Notes option (b)) means nested calls are
/// fully played out before `execute` ever returns, so `message` and
/// `wait_key` never appear on this side of the boundary.
pub fn message_from_result(context_id: u64, seq: u32, result: CallParameters) -> ExecutionMessage {
    let message_type = match result.kind {
        CallKind::Finished => MessageType::Finished,
        CallKind::Revert => MessageType::Revert,
        CallKind::Message | CallKind::WaitKey => MessageType::Revert,
    };
    ExecutionMessage {
        message_type,
        context_id,
        seq,
        from: result.sender,
        to: result.receiver,
        origin: result.origin,
        transaction_hash: None,
        data: result.output,
        gas_available: result.gas.saturating_sub(result.gas_used),
        static_call: result.static_call,
        create: result.create,
        create_kind: result.create_kind,
        create_salt: result.create_salt,
        status: result.status,
        message: result.message,
        log_entries: result.log_entries,
        new_evm_contract_address: result.new_contract_address,
        key_locks: result.key_locks,
    }
}
