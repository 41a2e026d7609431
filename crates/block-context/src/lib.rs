// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! Block Context (§4.E): the state shared by every frame executing
//! within one block — header fields, the block's overlay, the
//! key-lock table, and the precompiled registry.
//!
//! The source this was distilled from keeps a concurrent
//! `(contextID, seq) -> {executive, responseCallback}` map on the
//! block context itself, which makes the block context and its
//! executives reference each other (the map points at executives,
//! and an executive needs its block context back to resolve storage,
//! locks, and precompiled). §9 flags this cycle and recasts it as a
//! flat registry owned by the facade instead (`chain-executor`'s
//! `executives: Map<(contextID,seq), ExecutiveHandle>`); an executive
//! holds only a [`BlockCtxId`] and looks its block context up through
//! the facade when it needs one. `BlockContext` here therefore has no
//! knowledge of executives at all — see DESIGN.md.

use chain_executor_types::{Hash, KeyLockRegistry, ScheduleVersion};
use chain_precompiled::{Precompiled, PrecompiledRegistry};
use chain_state_store::Overlay;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies a block context for lookup through the facade, in place
/// of a direct reference (§9 "the executive holds a `BlockCtxId`").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockCtxId(pub u64);

/// The fixed header fields a block context is built from (§4.E
/// "block number, hash, timestamp, version, gas limit, schedule,
/// Wasm flag").
#[derive(Clone, Debug)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: Hash,
    pub timestamp: u64,
    pub schedule_version: ScheduleVersion,
    pub gas_limit: u64,
    pub wasm_enabled: bool,
}

/// Per-block state shared by every executive live in the block.
pub struct BlockContext {
    id: BlockCtxId,
    header: BlockHeader,
    overlay: Arc<Overlay>,
    key_locks: Arc<KeyLockRegistry>,
    precompiled: Arc<PrecompiledRegistry>,
    /// Monotonic `seq` source for frames opened under this block
    /// context, shared with `chain_executive::FrameDeps::seq_counter`.
    next_seq: AtomicU64,
}

impl BlockContext {
    /// Builds a fresh block context over an already-opened overlay
    /// (the facade calls `OverlayChain::next_block_header` first and
    /// passes the result in here). The precompiled registry is
    /// populated from the fixed Ethereum and system sets (§4.F); one
    /// key-lock table is shared by every executive in the block.
    pub fn new(id: BlockCtxId, header: BlockHeader, overlay: Arc<Overlay>) -> Self {
        tracing::debug!(block_number = header.number, "opened block context");
        Self {
            id,
            header,
            overlay,
            key_locks: Arc::new(KeyLockRegistry::new()),
            precompiled: Arc::new(PrecompiledRegistry::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> BlockCtxId {
        self.id
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn schedule_version(&self) -> ScheduleVersion {
        self.header.schedule_version
    }

    pub fn gas_limit(&self) -> u64 {
        self.header.gas_limit
    }

    pub fn wasm_enabled(&self) -> bool {
        self.header.wasm_enabled
    }

    pub fn overlay(&self) -> Arc<Overlay> {
        self.overlay.clone()
    }

    pub fn key_locks(&self) -> Arc<KeyLockRegistry> {
        self.key_locks.clone()
    }

    pub fn precompiled(&self) -> Arc<PrecompiledRegistry> {
        self.precompiled.clone()
    }

    /// `registerPrecompiled(p) -> address` (§4.E): assigns a fresh
    /// synthesized address and binds it for the lifetime of the
    /// block. Delegates to the registry; kept here too since callers
    /// reach for it through the block context, not the registry
    /// directly.
    pub fn register_precompiled(&self, p: Precompiled) -> chain_executor_types::ContractAddress {
        self.precompiled.register_precompiled(p)
    }

    /// Mints the next block-unique frame-tree id. The facade uses this
    /// as the `context_id` for a freshly dispatched top-level
    /// transaction (`chain_executive::FrameDeps::context_id`); nested
    /// calls within that transaction share the same `context_id` and
    /// get their own `seq` from a fresh, transaction-local
    /// `FrameDeps::seq_counter` instead of drawing from this counter.
    pub fn next_seq(&self) -> u32 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) as u32
    }

    /// Reserves `count` consecutive block-unique ids, returning the
    /// first (§4.G `base_context_id`). Every task in one DAG batch is
    /// its own top-level frame tree, so the DAG scheduler needs a
    /// contiguous range rather than one id at a time.
    pub fn reserve_context_ids(&self, count: u64) -> u64 {
        self.next_seq.fetch_add(count.max(1), Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_state_store::{Backend, InMemoryBackend};

    fn context() -> BlockContext {
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::default());
        let overlay = chain_state_store::Overlay::root(backend);
        let header = BlockHeader {
            number: 1,
            hash: [0u8; 32],
            timestamp: 1_700_000_000,
            schedule_version: 1,
            gas_limit: 30_000_000,
            wasm_enabled: true,
        };
        BlockContext::new(BlockCtxId(1), header, overlay)
    }

    #[test]
    fn precompiled_registry_has_ecrecover_at_address_one() {
        let ctx = context();
        let addr = chain_executor_types::ContractAddress::Evm(
            chain_precompiled::Ethereum::EcRecover.address(),
        );
        assert!(ctx.precompiled().contains(&addr));
    }

    #[test]
    fn register_precompiled_binds_for_the_block() {
        let ctx = context();
        let addr = ctx.register_precompiled(Precompiled::System(chain_precompiled::System::DagTransfer));
        assert!(ctx.precompiled().contains(&addr));
    }

    #[test]
    fn next_seq_is_monotonic_and_shared() {
        let ctx = context();
        assert_eq!(ctx.next_seq(), 0);
        assert_eq!(ctx.next_seq(), 1);
        assert_eq!(ctx.next_seq(), 2);
    }

    #[test]
    fn reserve_context_ids_hands_out_a_disjoint_range() {
        let ctx = context();
        assert_eq!(ctx.next_seq(), 0);
        let base = ctx.reserve_context_ids(5);
        assert_eq!(base, 1);
        assert_eq!(ctx.next_seq(), 6);
    }

    #[test]
    fn key_locks_are_shared_across_clones() {
        let ctx = context();
        let locks_a = ctx.key_locks();
        let locks_b = ctx.key_locks();
        locks_a.acquire("/apps/x", "k", 1).unwrap();
        assert!(locks_b.acquire("/apps/x", "k", 1).is_ok());
    }
}
