// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use chain_executor_types::Hash;
use parity_scale_codec::{Decode, Encode};

/// One instruction of the mock VM's script tape. A script is a
/// SCALE-encoded `Vec<MockOp>`; there is no jump/branch op, so every
/// script runs straight through until a terminal op or the tape ends.
#[derive(Clone, Debug, Encode, Decode)]
pub enum MockOp {
    /// `HostContext::set(key, value)`.
    Store { key: String, value: Vec<u8> },
    /// `HostContext::get(key)`, appended to the output accumulator.
    Load { key: String },
    /// Terminal: output is the frame's raw input data.
    ReturnInput,
    /// Terminal: output is exactly these bytes.
    Return(Vec<u8>),
    /// Terminal: reverts the frame with these bytes as output.
    Revert(Vec<u8>),
    /// `HostContext::call(receiver, input, gas)`; a callee revert
    /// reverts this frame too, with the callee's output. On success
    /// the callee's output is appended to the accumulator.
    Call { receiver: String, input: Vec<u8>, gas: u64 },
    /// Marks the bytes to persist as this contract's code when the
    /// frame is a `create`. Non-terminal: later ops (e.g. `Store` for
    /// constructor-time state) still run.
    Deploy(Vec<u8>),
    /// `HostContext::log(topics, data)`.
    Log { topics: Vec<Hash>, data: Vec<u8> },
}

/// Flat per-op gas charge. There is no attempt to model real opcode
/// costs — the mock VM only needs gas accounting deterministic enough
/// to exercise the executive's `OutOfGas` path.
pub const OP_GAS_COST: u64 = 100;

pub fn encode_script(ops: &[MockOp]) -> Vec<u8> {
    ops.to_vec().encode()
}
