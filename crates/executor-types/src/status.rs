// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// The status code carried on a `finished`/`revert` response (§7
/// error taxonomy, "TransactionStatus" row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    None,
    OutOfGas,
    OutOfGasLimit,
    BadInstruction,
    BadJumpDestination,
    OutOfStack,
    StackUnderflow,
    RevertInstruction,
    PermissionDenied,
    PrecompiledError,
    WasmValidationFailure,
    WasmArgumentOutOfRange,
    WasmUnreachableInstruction,
    CallAddressError,
    ContractAddressAlreadyUsed,
    NotEnoughCash,
    Unknown,
}

impl TransactionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TransactionStatus::None)
    }
}

/// The status a VM invocation returns (§4.D "VM status"), mapped
/// one-to-one onto [`TransactionStatus`] by [`VmStatus::into_transaction_status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmStatus {
    Success,
    Revert,
    OutOfGas,
    Failure,
    InvalidInstruction,
    UndefinedInstruction,
    BadJumpDestination,
    StackOverflow,
    StackUnderflow,
    InvalidMemoryAccess,
    StaticModeViolation,
    ContractValidationFailure,
    ArgumentOutOfRange,
    WasmUnreachableInstruction,
    InternalError,
}

/// Result of mapping a [`VmStatus`] to a transaction-level outcome.
/// `Fatal` corresponds to the spec's `internal_error` row: "fatal —
/// abort executor", which is a programmer-error path the executive
/// must not attempt to convert into a normal revert.
pub enum MappedStatus {
    Ok(TransactionStatus),
    Fatal,
}

impl VmStatus {
    pub fn into_transaction_status(self) -> MappedStatus {
        use MappedStatus::*;
        use TransactionStatus as T;
        match self {
            VmStatus::Success => Ok(T::None),
            VmStatus::Revert => Ok(T::RevertInstruction),
            VmStatus::OutOfGas | VmStatus::Failure => Ok(T::OutOfGas),
            VmStatus::InvalidInstruction | VmStatus::UndefinedInstruction => Ok(T::BadInstruction),
            VmStatus::BadJumpDestination => Ok(T::BadJumpDestination),
            VmStatus::StackOverflow => Ok(T::OutOfStack),
            VmStatus::StackUnderflow | VmStatus::InvalidMemoryAccess => Ok(T::StackUnderflow),
            VmStatus::StaticModeViolation => Ok(T::Unknown),
            VmStatus::ContractValidationFailure => Ok(T::WasmValidationFailure),
            VmStatus::ArgumentOutOfRange => Ok(T::WasmArgumentOutOfRange),
            VmStatus::WasmUnreachableInstruction => Ok(T::WasmUnreachableInstruction),
            VmStatus::InternalError => Fatal,
        }
    }
}
