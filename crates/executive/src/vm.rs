// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The pluggable VM boundary (§1 Non-goals: "does not prescribe a
//! specific VM implementation; it fixes only the host interface the
//! VM sees"). `chain-mock-vm` implements this trait for tests; a real
//! deployment plugs in an EVM or Wasm interpreter.

use chain_executor_types::{ScheduleVersion, VmStatus};
use chain_vm_host::HostContext;

/// The Wasm binary magic (§4.D step 3: "Wasm if bytecode begins with
/// the Wasm magic `00 61 73 6d`, otherwise EVM").
pub const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

pub fn is_wasm_bytecode(bytecode: &[u8]) -> bool {
    bytecode.starts_with(&WASM_MAGIC)
}

/// The result of one VM invocation (§4.D step 4, "VM status").
#[derive(Clone, Debug)]
pub struct VmOutcome {
    pub status: VmStatus,
    pub output: Vec<u8>,
    pub gas_remaining: u64,
}

/// A VM implementation, invoked by the executive once per frame that
/// isn't a precompiled call (§4.D step 3).
pub trait Vm: Send + Sync {
    fn run(&self, host: &mut HostContext, bytecode: &[u8], gas: u64, schedule: ScheduleVersion) -> VmOutcome;
}
