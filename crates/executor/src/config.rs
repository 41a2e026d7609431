// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::ExecutorError;
use chain_executor_types::ScheduleVersion;
use serde::{Deserialize, Serialize};

/// Construction-time knobs for the [`crate::Executor`] facade. None of
/// these are per-block — they're fixed for the process lifetime, the
/// way the original's executor factory takes them as constructor
/// arguments rather than per-call parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Gates VM opcode costs/semantics (§4.C `schedule`).
    pub schedule_version: ScheduleVersion,
    /// §4.E "Wasm flag" — whether `create` without a `create_kind` is
    /// accepted at all. Checked by the facade before dispatch, not by
    /// the executive itself (the executive has no opinion on policy).
    pub wasm_enabled: bool,
    /// §5 "DAG mode ... worker pool whose size defaults to hardware
    /// parallelism"; `0` means "use `num_cpus::get()`".
    pub dag_worker_threads: usize,
    /// Bound on the DAG scheduler's ABI cache (§4.G step 2c).
    pub abi_cache_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            schedule_version: 1,
            wasm_enabled: true,
            dag_worker_threads: 0,
            abi_cache_capacity: 4096,
        }
    }
}

impl ExecutorConfig {
    pub fn from_toml(text: &str) -> Result<Self, ExecutorError> {
        toml::from_str(text).map_err(|e| ExecutorError::Config(e.to_string()))
    }

    pub fn worker_threads(&self) -> usize {
        if self.dag_worker_threads == 0 {
            num_cpus::get()
        } else {
            self.dag_worker_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves_worker_threads_from_num_cpus() {
        let config = ExecutorConfig::default();
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn from_toml_overrides_defaults() {
        let config = ExecutorConfig::from_toml("wasm_enabled = false\nabi_cache_capacity = 10\n").unwrap();
        assert!(!config.wasm_enabled);
        assert_eq!(config.abi_cache_capacity, 10);
        assert_eq!(config.schedule_version, 1);
    }

    #[test]
    fn from_toml_rejects_malformed_input() {
        assert!(ExecutorConfig::from_toml("not valid toml =").is_err());
    }
}
