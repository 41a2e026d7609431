// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use crate::backend::Backend;
use crate::hash::hash_overlay;
use crate::overlay::Overlay;
use chain_executor_types::{Hash, StoreError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the chain of uncommitted block overlays and drives two-phase
/// commit against the durable [`Backend`] (§4.A "2PC", §4.H). The
/// Executor Facade (component H) holds exactly one `OverlayChain`.
pub struct OverlayChain {
    backend: Arc<dyn Backend>,
    overlays: RwLock<BTreeMap<u64, Arc<Overlay>>>,
    prepared: RwLock<BTreeMap<u64, ()>>,
}

impl OverlayChain {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            overlays: RwLock::new(BTreeMap::new()),
            prepared: RwLock::new(BTreeMap::new()),
        }
    }

    /// `nextBlockHeader(n)`: builds a new overlay on top of the last
    /// uncommitted one (or the backend if none is pending); rejects if
    /// an overlay for `n` already exists.
    pub fn next_block_header(&self, number: u64) -> Result<Arc<Overlay>, StoreError> {
        let mut overlays = self.overlays.write();
        if overlays.contains_key(&number) {
            return Err(StoreError::NumberMismatch {
                expected: number,
                got: number,
            });
        }
        let parent = overlays
            .iter()
            .next_back()
            .map(|(_, o)| o.clone());
        let overlay = match parent {
            Some(parent) => Overlay::child(number, parent),
            None => {
                let root = Overlay::root(self.backend.clone());
                if number == 0 {
                    root
                } else {
                    Overlay::child(number, root)
                }
            },
        };
        overlays.insert(number, overlay.clone());
        debug!(block_number = number, "opened new block overlay");
        Ok(overlay)
    }

    pub fn overlay(&self, number: u64) -> Option<Arc<Overlay>> {
        self.overlays.read().get(&number).cloned()
    }

    /// The durable backend underlying every overlay in this chain —
    /// used by a read-only `call` that roots a throwaway overlay
    /// directly on committed state (§4.H).
    pub fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    pub fn get_hash(&self, number: u64) -> Result<Hash, StoreError> {
        let overlay = self
            .overlays
            .read()
            .get(&number)
            .cloned()
            .ok_or(StoreError::NoUncommittedState)?;
        Ok(hash_overlay(&overlay))
    }

    fn oldest_uncommitted(&self) -> Option<u64> {
        self.overlays.read().keys().next().copied()
    }

    /// `prepare(n)`: serializes the overlay's mutations into the
    /// backend's write-ahead area. Requires `n` to be the oldest
    /// uncommitted overlay (§3 invariant, testable property 6).
    pub fn prepare(&self, number: u64) -> Result<(), StoreError> {
        let oldest = self.oldest_uncommitted().ok_or(StoreError::NoUncommittedState)?;
        if oldest != number {
            return Err(StoreError::NumberMismatch {
                expected: oldest,
                got: number,
            });
        }
        let overlay = self
            .overlays
            .read()
            .get(&number)
            .cloned()
            .ok_or(StoreError::NoUncommittedState)?;
        self.backend
            .prepare(number, overlay.own_mutations(), overlay.own_tables())?;
        self.prepared.write().insert(number, ());
        Ok(())
    }

    /// `commit(n)`: requires `n` to be prepared and the oldest
    /// uncommitted overlay; any other order fails (§3 invariant).
    pub fn commit(&self, number: u64) -> Result<(), StoreError> {
        let oldest = self.oldest_uncommitted().ok_or(StoreError::NoUncommittedState)?;
        if oldest != number {
            return Err(StoreError::NumberMismatch {
                expected: oldest,
                got: number,
            });
        }
        if !self.prepared.read().contains_key(&number) {
            return Err(StoreError::NoUncommittedState);
        }
        self.backend.commit(number)?;
        self.prepared.write().remove(&number);
        self.overlays.write().remove(&number);
        info!(block_number = number, "committed block overlay");
        Ok(())
    }

    /// `rollback(n)`: discards the prepared (or still-pending) overlay
    /// for `n` without touching the backend's committed state.
    pub fn rollback(&self, number: u64) -> Result<(), StoreError> {
        let oldest = self.oldest_uncommitted().ok_or(StoreError::NoUncommittedState)?;
        if oldest != number {
            return Err(StoreError::NumberMismatch {
                expected: oldest,
                got: number,
            });
        }
        if self.prepared.read().contains_key(&number) {
            self.backend.rollback(number)?;
        }
        self.prepared.write().remove(&number);
        self.overlays.write().remove(&number);
        info!(block_number = number, "rolled back block overlay");
        Ok(())
    }

    /// `reset()`: discards all in-memory uncommitted state.
    pub fn reset(&self) {
        for number in self.prepared.read().keys() {
            let _ = self.backend.rollback(*number);
        }
        self.prepared.write().clear();
        self.overlays.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::recoder::Recoder;
    use chain_executor_types::{Entry, EntryStatus};

    #[test]
    fn commit_requires_oldest_uncommitted() {
        let chain = OverlayChain::new(Arc::new(InMemoryBackend::new()));
        chain.next_block_header(1).unwrap();
        chain.next_block_header(2).unwrap();
        assert!(matches!(
            chain.commit(2),
            Err(StoreError::NumberMismatch { .. })
        ));
    }

    #[test]
    fn prepare_commit_round_trip_persists_to_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let chain = OverlayChain::new(backend.clone());
        let overlay = chain.next_block_header(1).unwrap();
        let mut recoder = Recoder::new();
        overlay.set_row(
            "T",
            "k",
            Entry {
                fields: vec!["v0".into()],
                version: 0,
                status: EntryStatus::Normal,
            },
            &mut recoder,
        );
        chain.prepare(1).unwrap();
        chain.commit(1).unwrap();
        assert_eq!(backend.get_row("T", "k").unwrap().unwrap().fields[0], "v0");
    }

    #[test]
    fn prepare_rollback_leaves_backend_unchanged() {
        let backend = Arc::new(InMemoryBackend::new());
        let chain = OverlayChain::new(backend.clone());
        let overlay = chain.next_block_header(1).unwrap();
        let mut recoder = Recoder::new();
        overlay.set_row(
            "T",
            "k",
            Entry {
                fields: vec!["v0".into()],
                version: 0,
                status: EntryStatus::Normal,
            },
            &mut recoder,
        );
        chain.prepare(1).unwrap();
        chain.rollback(1).unwrap();
        assert!(backend.get_row("T", "k").unwrap().is_none());
    }

    #[test]
    fn next_block_header_rejects_duplicate_number() {
        let chain = OverlayChain::new(Arc::new(InMemoryBackend::new()));
        chain.next_block_header(1).unwrap();
        assert!(chain.next_block_header(1).is_err());
    }
}
