// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The Executor Facade (§4.H): the one external service surface the
//! rest of the system talks to. Owns the [`chain_state_store::OverlayChain`],
//! a [`chain_block_context::BlockContext`] per open block, and the
//! [`chain_dag_scheduler::DagScheduler`]; every frame it dispatches runs
//! through [`chain_executive::Executive::execute`].

mod config;
mod error;
mod facade;
mod message;

pub use config::ExecutorConfig;
pub use error::ExecutorError;
pub use facade::Executor;
