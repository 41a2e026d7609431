// Copyright © chain-executor contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded ABI cache keyed by `to || selector` (§4.G step 2b/c). A
//! Wasm contract's decoded method list is stored alongside its code at
//! the reserved `codeAbi` row (§4.D step 5), SCALE-encoded as
//! `Vec<FunctionAbi>`; the cache holds one `Arc<FunctionAbi>` per
//! `(to, selector)` pair actually looked up, not the whole decoded
//! list, since most contracts expose only a handful of the methods any
//! one block's transactions touch.

use chain_executor_types::{parse_contract_address, FunctionAbi};
use chain_state_store::Overlay;
use chain_vm_host::CODE_ABI_ROW;
use lru::LruCache;
use parity_scale_codec::Decode;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub struct AbiCache {
    entries: Mutex<LruCache<(String, [u8; 4]), Arc<FunctionAbi>>>,
}

impl AbiCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or_else(|| NonZeroUsize::new(1).unwrap());
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the `FunctionAbi` matching `selector` on contract `to`,
    /// loading and decoding the contract's `codeAbi` row on a cache
    /// miss. `None` means "no ABI at this address" or "no method
    /// matches this selector" — both drive the caller's `SendBack`.
    pub fn lookup(&self, overlay: &Overlay, to: &str, selector: [u8; 4]) -> Option<Arc<FunctionAbi>> {
        let key = (to.to_string(), selector);
        if let Some(hit) = self.entries.lock().get(&key) {
            return Some(hit.clone());
        }
        let table = parse_contract_address(to).table_name();
        let row = overlay.get_row(&table, CODE_ABI_ROW)?;
        let hex_str = row.fields.first()?;
        let bytes = hex::decode(hex_str).ok()?;
        let methods = Vec::<FunctionAbi>::decode(&mut &bytes[..]).ok()?;
        let found = Arc::new(methods.into_iter().find(|m| m.selector == selector)?);
        self.entries.lock().put(key, found.clone());
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_executor_types::{ContractAddress, Entry, EntryStatus};
    use chain_state_store::{Backend, InMemoryBackend};
    use parity_scale_codec::Encode;

    fn overlay_with_abi(to: &ContractAddress, methods: &[FunctionAbi]) -> Arc<Overlay> {
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::default());
        let overlay = Overlay::root(backend);
        let mut recoder = chain_state_store::Recoder::new();
        overlay.create_table(&to.table_name(), "value", &mut recoder).unwrap();
        let encoded = methods.to_vec().encode();
        let entry = Entry {
            fields: vec![hex::encode(encoded)],
            version: 0,
            status: EntryStatus::Normal,
        };
        overlay.set_row(&to.table_name(), CODE_ABI_ROW, entry, &mut recoder);
        overlay
    }

    #[test]
    fn loads_and_caches_on_miss() {
        let to = ContractAddress::Wasm("/apps/token".into());
        let method = FunctionAbi {
            name: "transfer".into(),
            selector: [1, 2, 3, 4],
            inputs: vec![],
            conflict_fields: vec![],
        };
        let overlay = overlay_with_abi(&to, &[method.clone()]);
        let cache = AbiCache::new(8);
        let found = cache.lookup(&overlay, &to.to_hex(), [1, 2, 3, 4]).unwrap();
        assert_eq!(found.name, "transfer");
        // second lookup must hit the cache without touching the overlay
        // again; dropping the table would only matter if it fell through.
        let found_again = cache.lookup(&overlay, &to.to_hex(), [1, 2, 3, 4]).unwrap();
        assert_eq!(found_again.name, "transfer");
    }

    #[test]
    fn unknown_selector_misses() {
        let to = ContractAddress::Wasm("/apps/token".into());
        let overlay = overlay_with_abi(&to, &[]);
        let cache = AbiCache::new(8);
        assert!(cache.lookup(&overlay, &to.to_hex(), [9, 9, 9, 9]).is_none());
    }
}
