// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The Transaction Executive (§4.D) and its gas schedule and VM
//! boundary.

mod executive;
mod gas;
mod vm;

pub use executive::{Executive, ExecutiveStep, FrameDeps};
pub use gas::Schedule;
pub use vm::{is_wasm_bytecode, Vm, VmOutcome, WASM_MAGIC};
