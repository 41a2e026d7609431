// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The DAG Scheduler (§4.G): materializes a batch of pooled
//! transactions, decodes their ABI conflict fields, builds a static
//! dependency graph, and runs non-conflicting transactions in
//! parallel topological waves.

mod abi_cache;
mod conflict_key;
mod scale_walk;
mod scheduler;

pub use conflict_key::ConflictKey;
pub use scheduler::{DagItem, DagScheduler};
