// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The Precompiled Registry (§4.F): built-in system contracts
//! identified by reserved addresses, invoked synchronously from the
//! Transaction Executive (§4.D step 2) rather than through a VM.
//!
//! Dispatch is an enum-of-variants rather than a trait-object registry
//! (§9 Design Notes: "the enum form yields better inlining and avoids
//! heap indirection").

mod ethereum;
mod registry;
mod system;

pub use ethereum::Ethereum;
pub use registry::PrecompiledRegistry;
pub use system::System;

use chain_executor_types::TransactionStatus;
use chain_state_store::{Overlay, Recoder};

/// The block-scoped, read/write state a precompiled needs to remain a
/// pure function of `(blockContext-visible state, input)` (§4.F
/// "Determinism").
pub struct PrecompiledContext<'a> {
    pub overlay: &'a Overlay,
    pub recoder: &'a mut Recoder,
    pub block_number: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecompiledResult {
    pub gas_used: u64,
    pub output: Vec<u8>,
    pub status: TransactionStatus,
}

impl PrecompiledResult {
    pub fn ok(gas_used: u64, output: Vec<u8>) -> Self {
        Self {
            gas_used,
            output,
            status: TransactionStatus::None,
        }
    }

    pub fn error(gas_used: u64, status: TransactionStatus) -> Self {
        Self {
            gas_used,
            output: Vec::new(),
            status,
        }
    }
}

/// A precompiled contract, identified by a reserved address and
/// dispatched by the enum variant rather than virtual call (§4.F, §9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precompiled {
    Ethereum(Ethereum),
    System(System),
}

impl Precompiled {
    /// `call(context, input, origin, sender) -> {gas, output, status}`
    /// (§4.F). Every precompiled that spends gas computes its cost
    /// before any side effect and the caller subtracts it from the
    /// remaining gas before returning, per the determinism contract.
    pub fn call(&self, ctx: &mut PrecompiledContext, input: &[u8], origin: &str, sender: &str) -> PrecompiledResult {
        match self {
            Precompiled::Ethereum(p) => p.call(input),
            Precompiled::System(p) => p.call(ctx, input, origin, sender),
        }
    }

    /// `isParallel()`: whether the DAG scheduler may run calls to this
    /// precompiled alongside other transactions without a conflict
    /// edge (§4.F, §4.G).
    pub fn is_parallel(&self) -> bool {
        match self {
            Precompiled::Ethereum(_) => true,
            Precompiled::System(p) => p.is_parallel(),
        }
    }

    /// `parallelTags(input)`: the conflict domain this call touches,
    /// consumed by the DAG scheduler when `is_parallel()` is true but
    /// the call still has a data-dependent conflict footprint.
    pub fn parallel_tags(&self, input: &[u8]) -> Vec<String> {
        match self {
            Precompiled::Ethereum(_) => Vec::new(),
            Precompiled::System(p) => p.parallel_tags(input),
        }
    }
}
