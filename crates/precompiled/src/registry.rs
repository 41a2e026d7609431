// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! The registry populated once at executor construction from the
//! fixed Ethereum set (addresses `1..=9`) and the system set, then
//! extended at runtime as user contracts register their own
//! precompiled via [`PrecompiledRegistry::register_precompiled`]
//! (§4.E "registerPrecompiled").

use crate::{Ethereum, Precompiled, System};
use chain_executor_types::ContractAddress;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

const SYSTEM_TABLE_FACTORY: u64 = 0x1000;
const SYSTEM_KV_TABLE: u64 = 0x1001;
const SYSTEM_CNS: u64 = 0x1002;
const SYSTEM_CONSENSUS_CONFIG: u64 = 0x1003;
const SYSTEM_CRYPTO: u64 = 0x1004;
const SYSTEM_PARALLEL_CONFIG: u64 = 0x1005;
const SYSTEM_DAG_TRANSFER: u64 = 0x1006;
const SYSTEM_SYS_CONFIG: u64 = 0x1007;

fn address_from_u64(value: u64) -> ContractAddress {
    let mut addr = [0u8; 20];
    addr[12..].copy_from_slice(&value.to_be_bytes());
    ContractAddress::Evm(addr)
}

pub struct PrecompiledRegistry {
    entries: RwLock<HashMap<ContractAddress, Precompiled>>,
    next_synthesized: AtomicU64,
}

impl Default for PrecompiledRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PrecompiledRegistry {
    /// Populates the fixed Ethereum set at addresses `1..=9` and the
    /// system set at the constants above (§4.F).
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for eth in [
            Ethereum::EcRecover,
            Ethereum::Sha256,
            Ethereum::Ripemd160,
            Ethereum::Identity,
            Ethereum::Modexp,
            Ethereum::Bn128Add,
            Ethereum::Bn128Mul,
            Ethereum::Bn128Pairing,
            Ethereum::Blake2,
        ] {
            entries.insert(ContractAddress::Evm(eth.address()), Precompiled::Ethereum(eth));
        }
        for (addr, sys) in [
            (SYSTEM_TABLE_FACTORY, System::TableFactory),
            (SYSTEM_KV_TABLE, System::KvTable),
            (SYSTEM_CNS, System::Cns),
            (SYSTEM_CONSENSUS_CONFIG, System::ConsensusConfig),
            (SYSTEM_CRYPTO, System::Crypto),
            (SYSTEM_PARALLEL_CONFIG, System::ParallelConfig),
            (SYSTEM_DAG_TRANSFER, System::DagTransfer),
            (SYSTEM_SYS_CONFIG, System::SysConfig),
        ] {
            entries.insert(address_from_u64(addr), Precompiled::System(sys));
        }
        Self {
            entries: RwLock::new(entries),
            next_synthesized: AtomicU64::new(SYSTEM_SYS_CONFIG + 1),
        }
    }

    pub fn get(&self, address: &ContractAddress) -> Option<Precompiled> {
        self.entries.read().unwrap().get(address).copied()
    }

    pub fn contains(&self, address: &ContractAddress) -> bool {
        self.entries.read().unwrap().contains_key(address)
    }

    /// `registerPrecompiled(p) -> address`: assigns a fresh synthesized
    /// address (a counter printed as 20-byte hex) and stores the
    /// binding for the lifetime of the block (§4.E).
    pub fn register_precompiled(&self, p: Precompiled) -> ContractAddress {
        let slot = self.next_synthesized.fetch_add(1, Ordering::SeqCst);
        let addr = address_from_u64(slot);
        self.entries.write().unwrap().insert(addr.clone(), p);
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecrecover_is_present_at_address_one() {
        let registry = PrecompiledRegistry::new();
        let addr = ContractAddress::Evm(Ethereum::EcRecover.address());
        assert_eq!(registry.get(&addr), Some(Precompiled::Ethereum(Ethereum::EcRecover)));
    }

    #[test]
    fn register_precompiled_assigns_fresh_address_each_time() {
        let registry = PrecompiledRegistry::new();
        let a = registry.register_precompiled(Precompiled::System(System::DagTransfer));
        let b = registry.register_precompiled(Precompiled::System(System::DagTransfer));
        assert_ne!(a, b);
        assert!(registry.contains(&a));
        assert!(registry.contains(&b));
    }
}
