// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use chain_executor_types::{PoolError, StoreError};
use thiserror::Error;

/// Errors surfaced by the facade's own entry points (§4.H, §7). Errors
/// raised *inside* a frame (VM failure, deadlock) never reach here —
/// they're already folded into the returned `ExecutionMessage`'s
/// `status`/`message_type` (§7 "Propagation policy").
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("no block context open for block {0}")]
    NoBlockContext(u64),

    #[error("block context already open for block {0}")]
    BlockContextExists(u64),

    #[error("wasm is disabled for this executor")]
    WasmDisabled,

    #[error("invalid executor config: {0}")]
    Config(String),
}
