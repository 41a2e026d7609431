// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! A test-double VM (§1 Non-goals: "does not prescribe a specific VM
//! implementation; it fixes only the host interface the VM sees").
//! Bytecode is a tiny SCALE-encoded script tape rather than real
//! EVM/Wasm bytes — enough to drive the executive's dispatch, gas,
//! revert, and nested-call paths end to end in tests.

mod ops;
mod vm;

pub use ops::{encode_script, MockOp, OP_GAS_COST};
pub use vm::MockVm;
