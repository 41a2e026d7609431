// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors surfaced by the Versioned State Store (§4.A "Errors"). All
/// backend diagnostics are carried unchanged in `Backend(String)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("block number mismatch: expected {expected}, got {got}")]
    NumberMismatch { expected: u64, got: u64 },

    #[error("no uncommitted state pending")]
    NoUncommittedState,

    #[error("backend error: {0}")]
    Backend(String),
}
