// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

use crate::overlay::Overlay;
use chain_executor_types::Hash;
use sha3::{Digest, Keccak256};

/// `hash()`: a deterministic digest of all key/value mutations in the
/// overlay (not the parent chain) in canonical key order — table,
/// then key, lexicographic (§4.A "Hashing"). Empty overlays hash to
/// the zero hash.
pub fn hash_overlay(overlay: &Overlay) -> Hash {
    let mutations = overlay.own_mutations();
    if mutations.is_empty() {
        return [0u8; 32];
    }
    let mut hasher = Keccak256::new();
    for ((table, key), entry) in mutations {
        hasher.update((table.len() as u64).to_le_bytes());
        hasher.update(table.as_bytes());
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update(entry.version.to_le_bytes());
        hasher.update([entry.is_deleted() as u8]);
        for field in &entry.fields {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::recoder::Recoder;
    use chain_executor_types::{Entry, EntryStatus};
    use std::sync::Arc;

    #[test]
    fn empty_overlay_hashes_to_zero() {
        let overlay = Overlay::root(Arc::new(InMemoryBackend::new()));
        assert_eq!(hash_overlay(&overlay), [0u8; 32]);
    }

    #[test]
    fn hash_is_deterministic_and_order_independent_of_insertion() {
        let backend = Arc::new(InMemoryBackend::new());
        let o1 = Overlay::root(backend.clone());
        let mut r1 = Recoder::new();
        o1.set_row("T", "b", Entry { fields: vec!["2".into()], version: 0, status: EntryStatus::Normal }, &mut r1);
        o1.set_row("T", "a", Entry { fields: vec!["1".into()], version: 0, status: EntryStatus::Normal }, &mut r1);

        let o2 = Overlay::root(backend);
        let mut r2 = Recoder::new();
        o2.set_row("T", "a", Entry { fields: vec!["1".into()], version: 0, status: EntryStatus::Normal }, &mut r2);
        o2.set_row("T", "b", Entry { fields: vec!["2".into()], version: 0, status: EntryStatus::Normal }, &mut r2);

        assert_eq!(hash_overlay(&o1), hash_overlay(&o2));
    }
}
